pub mod booking_reader;
pub mod booking_writer;

pub use booking_reader::BookingReader;
pub use booking_writer::BookingWriter;
