//! Application State

use std::sync::Arc;

use storefront_core::{CardMetadataService, PaymentGateway, Tokenizer};
use storefront_payments::{MemoryPaymentLedger, ProcessorClient, WebhookHandler};

/// Processor-backed services (the real client, or fakes in tests)
#[derive(Clone)]
pub struct PaymentServices {
    pub gateway: Arc<dyn PaymentGateway>,
    pub card_metadata: Arc<dyn CardMetadataService>,
    pub tokenizer: Arc<dyn Tokenizer>,
}

impl PaymentServices {
    pub fn from_client(client: ProcessorClient) -> Self {
        let client = Arc::new(client);
        Self {
            gateway: client.clone(),
            card_metadata: client.clone(),
            tokenizer: client,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// None if the processor keys are not configured
    pub payments: Option<PaymentServices>,

    /// Webhook processing and the payment ledger behind it
    pub webhooks: Arc<WebhookHandler<MemoryPaymentLedger>>,

    /// Shared secret for webhook signatures
    pub webhook_secret: Option<String>,
}
