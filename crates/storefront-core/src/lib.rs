//! # storefront-core
//!
//! Cart, checkout flow and ticket presale logic for the storefront pages.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  CartStore ──► CheckoutController ──┐                            │
//! │                                     ├──► PaymentHandoff ──► PSP  │
//! │  EligibilityGate ──► HoldTimer ─────┘                            │
//! │                                                                  │
//! │  FxAdapter (display prices)     Storage (durable + session)      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every store is built from a fresh storage read when a page loads and
//! writes through on each change. The processor is reached only through the
//! traits in [`gateway`], so pages can run against the real service, the
//! storefront server's proxy, or a test fake.

pub mod cart;
pub mod checkout;
pub mod clock;
pub mod currency;
pub mod eligibility;
pub mod error;
pub mod gateway;
pub mod handoff;
pub mod hold;
pub mod model;
pub mod rates;
pub mod session;
pub mod storage;
pub mod verification;

pub use cart::CartStore;
pub use checkout::{CheckoutAction, CheckoutController, CheckoutState, Section, SectionState, Transition};
pub use clock::{Clock, ManualClock, SystemClock};
pub use currency::{CurrencyPreference, FxAdapter};
pub use eligibility::{EligibilityCriteria, EligibilityGate, GateStatus, ProbeDriver};
pub use error::{FieldErrors, Result, StorefrontError};
pub use gateway::{CardMetadataService, PaymentGateway, ProbeKind, Tokenizer};
pub use handoff::{HandoffMode, HandoffOutcome, PayloadBuilder, PaymentHandoff, PaymentPayload, WidgetEvent};
pub use hold::{HoldTick, HoldTicker, HoldTimer, SeatHold};
pub use model::{CartItem, Carrier, Currency, Customer, Page, ShippingAddress};
pub use rates::{RatesSource, StaticRatesSource};
pub use session::ShopperSession;
pub use storage::{FileStorage, MemoryStorage, Scope, Storage, StorageKey};
