use super::bounded;
use crate::domain::crypto::{CryptoInvoice, InvoiceRequest};
use crate::domain::ports::CryptoGatewayRef;
use crate::error::{CheckoutError, GatewayError, Result};
use std::time::Duration;
use tracing::{info, warn};

/// Creates crypto invoices.
///
/// One call per request and no internal retry: a failed creation leaves no
/// invoice behind, and retrying is the caller's decision.
pub struct InvoiceLifecycleManager {
    gateway: CryptoGatewayRef,
    timeout: Duration,
}

impl InvoiceLifecycleManager {
    pub fn new(gateway: CryptoGatewayRef, timeout: Duration) -> Self {
        Self { gateway, timeout }
    }

    pub async fn create(&self, request: &InvoiceRequest) -> Result<CryptoInvoice> {
        let invoice = bounded(self.timeout, self.gateway.create_invoice(request))
            .await
            .and_then(|invoice| {
                if invoice.order_id != request.order_id {
                    Err(GatewayError::Malformed(format!(
                        "invoice {} is for order {}, expected {}",
                        invoice.id, invoice.order_id, request.order_id
                    )))
                } else if invoice.pay_currency != request.pay_currency {
                    Err(GatewayError::Malformed(format!(
                        "invoice {} is payable in {}, expected {}",
                        invoice.id, invoice.pay_currency, request.pay_currency
                    )))
                } else {
                    Ok(invoice)
                }
            })
            .map_err(|e| {
                warn!(order_id = %request.order_id, error = %e, "Invoice creation failed");
                CheckoutError::gateway("crypto", "create invoice", e)
            })?;

        info!(
            order_id = %invoice.order_id,
            invoice_id = %invoice.id,
            pay_currency = %invoice.pay_currency,
            "Invoice created"
        );
        Ok(invoice)
    }
}
