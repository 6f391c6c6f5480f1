//! Outer surfaces: CSV import and export of booking records.

pub mod csv;
