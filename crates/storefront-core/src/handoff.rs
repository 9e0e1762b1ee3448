//! Payment Handoff
//!
//! Builds the payload for the processor and hands the shopper over, either by
//! redirecting to a hosted page or by mounting the processor's widget. Every
//! attempt carries a fresh reference, so retries are separate orders.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::CartStore;
use crate::clock::Clock;
use crate::currency::FxAdapter;
use crate::error::{FieldErrors, Result, StorefrontError};
use crate::gateway::{PaymentGateway, PaymentSession};
use crate::hold::{SeatHold, release_hold};
use crate::model::{Carrier, Currency, Customer, Page};
use crate::session::ShopperSession;
use crate::storage::{Scope, Storage, StorageKey, load_json, save_json};

/// One priced line sent to the processor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductLine {
    pub name: String,
    pub quantity: u32,
    pub unit_price_minor_units: i64,
    pub total_minor_units: i64,
}

/// Request body for a hosted link or an embedded session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPayload {
    /// Fresh for every attempt
    pub reference: String,
    /// ISO 3166 alpha-2 billing country
    pub country: String,
    pub currency: Currency,
    /// Sum of the product lines
    pub amount_minor_units: i64,
    pub customer: Customer,
    pub product_lines: Vec<ProductLine>,
    /// Ask the shopper to let the processor store the card
    pub collect_consent: bool,
}

/// Assembles `PaymentPayload`s in one settlement currency
pub struct PayloadBuilder {
    clock: Arc<dyn Clock>,
    country: String,
    currency: Currency,
    customer: Customer,
    collect_consent: bool,
}

impl PayloadBuilder {
    pub fn new(clock: Arc<dyn Clock>, country: impl Into<String>, currency: Currency) -> Self {
        Self {
            clock,
            country: country.into(),
            currency,
            customer: Customer::default(),
            collect_consent: false,
        }
    }

    #[must_use]
    pub fn customer(mut self, customer: Customer) -> Self {
        self.customer = customer;
        self
    }

    #[must_use]
    pub const fn collect_consent(mut self, collect: bool) -> Self {
        self.collect_consent = collect;
        self
    }

    /// Cart lines plus the carrier fee as its own line
    pub fn from_cart(&self, cart: &CartStore, carrier: &Carrier, fx: &FxAdapter) -> Result<PaymentPayload> {
        if cart.is_empty() {
            let mut errors = FieldErrors::new();
            errors.add("cart", "cart is empty");
            return Err(StorefrontError::Validation(errors));
        }

        let mut lines: Vec<ProductLine> = cart
            .items()
            .iter()
            .map(|item| self.line(&item.name, item.quantity, item.unit_price_canonical, fx))
            .collect();

        if carrier.fee > Decimal::ZERO {
            lines.push(self.line(&format!("Shipping ({})", carrier.name), 1, carrier.fee, fx));
        }

        Ok(self.build(lines))
    }

    /// A single ticket for the held seat
    pub fn for_seat(&self, hold: &SeatHold, ticket_price: Decimal, fx: &FxAdapter) -> PaymentPayload {
        let line = self.line(&format!("Ticket - seat {}", hold.seat), 1, ticket_price, fx);
        self.build(vec![line])
    }

    fn line(&self, name: &str, quantity: u32, unit_price_canonical: Decimal, fx: &FxAdapter) -> ProductLine {
        let unit = self.currency.to_minor_units(fx.convert(unit_price_canonical, self.currency));
        ProductLine {
            name: name.to_string(),
            quantity,
            unit_price_minor_units: unit,
            total_minor_units: unit.saturating_mul(i64::from(quantity)),
        }
    }

    fn build(&self, product_lines: Vec<ProductLine>) -> PaymentPayload {
        let amount_minor_units = product_lines
            .iter()
            .fold(0_i64, |acc, line| acc.saturating_add(line.total_minor_units));

        PaymentPayload {
            reference: self.reference(),
            country: self.country.clone(),
            currency: self.currency,
            amount_minor_units,
            customer: self.customer.clone(),
            product_lines,
            collect_consent: self.collect_consent,
        }
    }

    /// Time-based with a random suffix for attempts in the same millisecond
    fn reference(&self) -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("ORD-{}-{}", self.clock.now().timestamp_millis(), &suffix[..6])
    }
}

/// How the shopper is handed to the processor
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffMode {
    /// Hosted payment page
    #[default]
    Redirect,
    /// Processor widget mounted in our page
    Embedded,
}

/// What the page should do after `start`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandoffOutcome {
    Redirect(String),
    MountWidget(PaymentSession),
}

/// Callbacks from the embedded widget
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WidgetEvent {
    Ready,
    Completed { payment_id: String },
    Error { message: String },
}

/// Page reaction to a widget event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WidgetOutcome {
    /// Nothing to do yet
    Waiting,
    /// Show the message and let the shopper try again
    Retry(String),
    Navigate(Page),
}

/// Drives one payment attempt through the gateway
pub struct PaymentHandoff {
    gateway: Arc<dyn PaymentGateway>,
    storage: Arc<dyn Storage>,
    session: ShopperSession,
}

impl PaymentHandoff {
    pub fn new(gateway: Arc<dyn PaymentGateway>, storage: Arc<dyn Storage>) -> Self {
        let session = ShopperSession::new(storage.clone());
        Self {
            gateway,
            storage,
            session,
        }
    }

    pub fn mode(&self) -> HandoffMode {
        load_json(self.storage.as_ref(), Scope::Durable, StorageKey::HandoffMode).unwrap_or_default()
    }

    pub fn set_mode(&self, mode: HandoffMode) -> Result<()> {
        tracing::debug!(?mode, "Handoff mode changed");
        save_json(self.storage.as_ref(), Scope::Durable, StorageKey::HandoffMode, &mode)
    }

    /// Payload of the attempt currently with the processor
    pub fn in_flight(&self) -> Option<PaymentPayload> {
        load_json(self.storage.as_ref(), Scope::Session, StorageKey::PaymentInFlight)
    }

    /// Ask the processor for a link or session in the persisted mode
    ///
    /// Failures come back as `StorefrontError::Handoff` carrying the
    /// processor's message; nothing else is touched, so the shopper can retry.
    pub async fn start(&self, payload: &PaymentPayload) -> Result<HandoffOutcome> {
        let mode = self.mode();
        tracing::info!(
            reference = %payload.reference,
            amount = payload.amount_minor_units,
            currency = %payload.currency,
            ?mode,
            "Starting payment handoff"
        );

        let outcome = match mode {
            HandoffMode::Redirect => {
                let link = self.gateway.create_payment_link(payload).await.map_err(into_handoff)?;
                if link.link.trim().is_empty() {
                    return Err(StorefrontError::Handoff("payment link missing from processor response".into()));
                }
                HandoffOutcome::Redirect(link.link)
            }
            HandoffMode::Embedded => {
                let session = self.gateway.create_payment_session(payload).await.map_err(into_handoff)?;
                if session.payment_session_token.trim().is_empty() {
                    return Err(StorefrontError::Handoff("payment session token missing from processor response".into()));
                }
                HandoffOutcome::MountWidget(session)
            }
        };

        save_json(self.storage.as_ref(), Scope::Session, StorageKey::PaymentInFlight, payload)?;

        // The shopper leaves for the hosted page, so the hold is done
        if matches!(outcome, HandoffOutcome::Redirect(_)) {
            release_hold(self.storage.as_ref());
        }
        Ok(outcome)
    }

    /// React to the embedded widget
    pub async fn on_widget_event(&self, event: WidgetEvent) -> Result<WidgetOutcome> {
        match event {
            WidgetEvent::Ready => Ok(WidgetOutcome::Waiting),
            WidgetEvent::Error { message } => {
                tracing::warn!(%message, "Payment widget reported an error");
                Ok(WidgetOutcome::Retry(message))
            }
            WidgetEvent::Completed { payment_id } => {
                tracing::info!(%payment_id, "Payment completed");

                // The payment went through either way; the ids only speed up the next checkout
                match self.gateway.fetch_payment_details(&payment_id).await {
                    Ok(details) => self
                        .session
                        .remember_payment(details.customer_id.as_deref(), details.instrument_id.as_deref())?,
                    Err(e) => {
                        tracing::warn!(%payment_id, error = %e, "Could not fetch payment details");
                    }
                }

                release_hold(self.storage.as_ref());
                self.storage.remove(Scope::Session, StorageKey::PaymentInFlight)?;
                Ok(WidgetOutcome::Navigate(Page::Success))
            }
        }
    }
}

fn into_handoff(error: StorefrontError) -> StorefrontError {
    match error {
        StorefrontError::Handoff(_) => error,
        other => StorefrontError::Handoff(other.to_string()),
    }
}
