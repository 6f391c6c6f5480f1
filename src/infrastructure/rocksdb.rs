use crate::domain::booking::{Booking, BookingId, PaymentTransition};
use crate::domain::ports::BookingStore;
use crate::error::{CheckoutError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for storing bookings, keyed by booking id.
pub const CF_BOOKINGS: &str = "bookings";

fn internal(message: String) -> CheckoutError {
    CheckoutError::InternalError(Box::new(std::io::Error::other(message)))
}

/// A persistent booking store using RocksDB.
///
/// Conditional payment updates are serialized through a writer lock so the
/// read-compare-write happens atomically with respect to other updates made
/// through this handle and its clones.
#[derive(Clone)]
pub struct RocksDbBookingStore {
    db: Arc<DB>,
    writer: Arc<Mutex<()>>,
}

impl RocksDbBookingStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the "bookings" column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_bookings = ColumnFamilyDescriptor::new(CF_BOOKINGS, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_bookings])?;

        Ok(Self {
            db: Arc::new(db),
            writer: Arc::new(Mutex::new(())),
        })
    }

    fn read(&self, id: &BookingId) -> Result<Option<Booking>> {
        let cf = self
            .db
            .cf_handle(CF_BOOKINGS)
            .ok_or_else(|| internal("Bookings column family not found".to_string()))?;
        match self.db.get_cf(&cf, id.as_str().as_bytes())? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| internal(format!("Deserialization error: {e}"))),
            None => Ok(None),
        }
    }

    fn write(&self, booking: &Booking) -> Result<()> {
        let cf = self
            .db
            .cf_handle(CF_BOOKINGS)
            .ok_or_else(|| internal("Bookings column family not found".to_string()))?;
        let value =
            serde_json::to_vec(booking).map_err(|e| internal(format!("Serialization error: {e}")))?;
        self.db.put_cf(&cf, booking.id.as_str().as_bytes(), value)?;
        Ok(())
    }
}

#[async_trait]
impl BookingStore for RocksDbBookingStore {
    async fn store(&self, booking: Booking) -> Result<()> {
        let _guard = self.writer.lock().await;
        self.write(&booking)
    }

    async fn get_booking(&self, id: &BookingId) -> Result<Option<Booking>> {
        self.read(id)
    }

    async fn update_payment_status(
        &self,
        id: &BookingId,
        transition: &PaymentTransition,
    ) -> Result<bool> {
        let _guard = self.writer.lock().await;
        let Some(mut booking) = self.read(id)? else {
            return Ok(false);
        };
        if !booking.apply(transition) {
            return Ok(false);
        }
        self.write(&booking)?;
        Ok(true)
    }

    async fn all_bookings(&self) -> Result<Vec<Booking>> {
        let handle = self
            .db
            .cf_handle(CF_BOOKINGS)
            .ok_or_else(|| internal("Bookings column family not found".to_string()))?;

        let mut bookings = Vec::new();
        for item in self.db.iterator_cf(handle, rocksdb::IteratorMode::Start) {
            let (_key, value) = item.map_err(|e| internal(format!("RocksDB iteration error: {e}")))?;
            let booking: Booking = serde_json::from_slice(&value)
                .map_err(|e| internal(format!("Failed to deserialize booking: {e}")))?;
            bookings.push(booking);
        }

        Ok(bookings)
    }
}
