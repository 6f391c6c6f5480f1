use crate::domain::booking::Booking;
use crate::error::{CheckoutError, Result};
use std::io::Read;

/// Reads bookings from a CSV source.
///
/// Expected columns: `id, amount, currency, status, payment_status, reference`.
/// The `reference` column may be empty or missing.
pub struct BookingReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> BookingReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes bookings, one `Result` per row.
    pub fn bookings(self) -> impl Iterator<Item = Result<Booking>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(CheckoutError::from))
    }
}
