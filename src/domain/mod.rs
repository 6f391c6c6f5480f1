//! Domain model of the checkout core: bookings, money, payment attempts,
//! crypto invoices, and the ports through which the core talks to gateways
//! and the booking subsystem.

pub mod booking;
pub mod crypto;
pub mod money;
pub mod payment;
pub mod ports;
