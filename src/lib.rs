//! Checkout core for travel bookings.
//!
//! Lets a buyer pay for a booking by card/bank transfer or by cryptocurrency,
//! verifies every payment server-side and writes the outcome back to the
//! booking record exactly once.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
