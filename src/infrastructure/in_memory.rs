use crate::domain::booking::{Booking, BookingId, PaymentTransition};
use crate::domain::ports::BookingStore;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory booking store.
///
/// Uses `Arc<RwLock<HashMap<BookingId, Booking>>>` to allow shared concurrent access.
/// Conditional updates hold the write lock for the whole compare-and-set.
#[derive(Default, Clone)]
pub struct InMemoryBookingStore {
    bookings: Arc<RwLock<HashMap<BookingId, Booking>>>,
}

impl InMemoryBookingStore {
    /// Creates a new, empty in-memory booking store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn store(&self, booking: Booking) -> Result<()> {
        let mut bookings = self.bookings.write().await;
        bookings.insert(booking.id.clone(), booking);
        Ok(())
    }

    async fn get_booking(&self, id: &BookingId) -> Result<Option<Booking>> {
        let bookings = self.bookings.read().await;
        Ok(bookings.get(id).cloned())
    }

    async fn update_payment_status(
        &self,
        id: &BookingId,
        transition: &PaymentTransition,
    ) -> Result<bool> {
        let mut bookings = self.bookings.write().await;
        Ok(bookings
            .get_mut(id)
            .is_some_and(|booking| booking.apply(transition)))
    }

    async fn all_bookings(&self) -> Result<Vec<Booking>> {
        let bookings = self.bookings.read().await;
        let mut all: Vec<Booking> = bookings.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }
}
