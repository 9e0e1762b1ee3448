//! Presale Eligibility
//!
//! Ticket presales are limited to cards matching configurable criteria.
//! The card number is probed against the processor's BIN lookup as it is
//! typed, and seat selection unlocks only for an eligible card.
//!
//! - `criteria`: what an eligible card looks like, and the matching rule
//! - `gate`: debounced probing with stale-response discarding
//! - `card`: optional card saving through tokenization

mod card;
mod criteria;
mod gate;

pub use card::{CardVault, SaveCardForm, SavedCard, parse_expiry, validate_card_form};
pub use criteria::{
    CriteriaStore, Criterion, CriterionFailure, EligibilityCriteria, EligibilityDecision,
    ProductType, Scheme, check_eligibility,
};
pub use gate::{DEFAULT_QUIET_PERIOD, EligibilityGate, GateStatus, ProbeDriver, ProbeTicket, card_digits};
