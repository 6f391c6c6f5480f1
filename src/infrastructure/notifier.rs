use crate::domain::ports::{BookingConfirmed, BookingNotifier};
use crate::error::{CheckoutError, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::info;

/// Emits confirmations as structured log events.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

#[async_trait]
impl BookingNotifier for TracingNotifier {
    async fn booking_confirmed(&self, event: &BookingConfirmed) -> Result<()> {
        info!(
            booking = %event.booking_id,
            reference = %event.reference,
            method = %event.method,
            confirmed_at = %event.confirmed_at.to_rfc3339(),
            "Booking confirmed"
        );
        Ok(())
    }
}

/// Forwards confirmations to an in-process consumer (email, ticketing).
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<BookingConfirmed>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BookingConfirmed>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl BookingNotifier for ChannelNotifier {
    async fn booking_confirmed(&self, event: &BookingConfirmed) -> Result<()> {
        self.sender.send(event.clone()).map_err(|e| {
            CheckoutError::InternalError(Box::new(std::io::Error::other(format!(
                "confirmation consumer is gone: {e}"
            ))))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::BookingId;
    use crate::domain::payment::PaymentMethod;
    use chrono::Utc;

    fn event() -> BookingConfirmed {
        BookingConfirmed {
            booking_id: BookingId::new("bk-1").unwrap(),
            reference: "FIAT_bk-1_1".to_string(),
            method: PaymentMethod::Fiat,
            confirmed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_channel_notifier_delivers() {
        let (notifier, mut receiver) = ChannelNotifier::new();
        notifier.booking_confirmed(&event()).await.unwrap();
        let received = receiver.recv().await.unwrap();
        assert_eq!(received.reference, "FIAT_bk-1_1");
    }

    #[tokio::test]
    async fn test_channel_notifier_reports_closed_consumer() {
        let (notifier, receiver) = ChannelNotifier::new();
        drop(receiver);
        assert!(notifier.booking_confirmed(&event()).await.is_err());
    }
}
