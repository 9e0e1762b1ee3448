//! # storefront-payments
//!
//! Payment processor integration for the storefront.
//!
//! ## Handoff Strategies
//!
//! The storefront supports two ways of taking payment, chosen by a persisted
//! toggle on the payment page.
//!
//! ### 1. Hosted payment page (Redirect)
//!
//! **Flow:** Our page → Redirect to the processor's hosted page → Redirect back
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────┐     ┌─────────────┐
//! │  Checkout   │────▶│  Processor       │────▶│  Success    │
//! │  page       │     │  hosted page     │     │  page       │
//! └─────────────┘     └──────────────────┘     └─────────────┘
//! ```
//!
//! No card data touches our pages. The shopper leaves the site briefly.
//!
//! ### 2. Embedded widget (Payment session)
//!
//! **Flow:** The processor's widget is mounted inside our payment page
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │           Ticket payment page           │
//! │  ┌────────────────────────────────┐    │
//! │  │   Processor widget (iframe)    │    │
//! │  │   Card Number: ████ ████ ████  │    │
//! │  └────────────────────────────────┘    │
//! └────────────────────────────────────────┘
//! ```
//!
//! The widget reports ready / completed / error; on completion the page looks
//! up the payment to remember the returning customer's identifiers.
//!
//! ## Clients
//!
//! - [`ProcessorClient`] holds the secret key and runs inside the server.
//! - [`ProxyClient`] runs with the pages and calls the server's `/api` routes.
//!
//! Both implement the `storefront_core::gateway` traits.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use storefront_payments::ProcessorClient;
//! use storefront_core::PaymentGateway;
//!
//! let client = ProcessorClient::from_env()?;
//! let link = client.create_payment_link(&payload).await?;
//!
//! // Redirect shopper to: link.link
//! ```

mod client;
mod config;
mod error;
mod ledger;
mod proxy;
mod webhook;

pub use client::ProcessorClient;
pub use config::ProcessorConfig;
pub use error::{PaymentError, Result};
pub use ledger::{MemoryPaymentLedger, PaymentLedger, PaymentRecord, PaymentStatus};
pub use proxy::{ApiError, CardMetadataRequest, ProxyClient, decode_error};
pub use webhook::{ProcessorEvent, SIGNATURE_HEADER, WebhookEvent, WebhookHandler, sign, verify_signature};
