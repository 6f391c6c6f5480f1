use crate::domain::booking::Booking;
use crate::error::Result;
use std::io::Write;

/// Writes bookings as CSV with the same columns [`super::BookingReader`] accepts.
pub struct BookingWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> BookingWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_bookings(&mut self, bookings: impl IntoIterator<Item = Booking>) -> Result<()> {
        for booking in bookings {
            self.writer.serialize(booking)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::{BookingId, PaymentTransition};
    use crate::domain::money::{Amount, CurrencyCode};
    use rust_decimal_macros::dec;

    #[test]
    fn test_writes_header_and_rows() {
        let mut settled = Booking::new(
            BookingId::new("bk-1").unwrap(),
            Amount::new(dec!(120.50)).unwrap(),
            CurrencyCode::new("USD").unwrap(),
        );
        settled.apply(&PaymentTransition::settle("FIAT_bk-1_3"));
        let open = Booking::new(
            BookingId::new("bk-2").unwrap(),
            Amount::new(dec!(500)).unwrap(),
            CurrencyCode::new("NGN").unwrap(),
        );

        let mut out = Vec::new();
        BookingWriter::new(&mut out)
            .write_bookings(vec![settled, open])
            .unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(
            text,
            "id,amount,currency,status,payment_status,reference\n\
             bk-1,120.50,USD,confirmed,completed,FIAT_bk-1_3\n\
             bk-2,500,NGN,pending,pending,\n"
        );
    }
}
