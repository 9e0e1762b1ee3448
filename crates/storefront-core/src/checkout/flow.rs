//! Checkout state machine

use serde::{Deserialize, Serialize};

use crate::error::{FieldErrors, Result};
use crate::model::{Carrier, ShippingAddress};
use crate::verification::validate_phone;

/// Visibility of one checkout section
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionState {
    /// Done, showing a summary
    Collapsed,
    /// Open for editing
    Expanded,
    /// Not reached yet
    Hidden,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Shipping,
    Carrier,
    Payment,
}

/// Full wizard state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutState {
    pub shipping: SectionState,
    pub carrier: SectionState,
    pub payment: SectionState,

    /// Set once shipping validates
    pub address: Option<ShippingAddress>,

    /// Exactly one carrier is active at any time
    pub selected_carrier: Carrier,
}

impl CheckoutState {
    /// Shipping open, everything else hidden
    pub fn new(default_carrier: Carrier) -> Self {
        Self {
            shipping: SectionState::Expanded,
            carrier: SectionState::Hidden,
            payment: SectionState::Hidden,
            address: None,
            selected_carrier: default_carrier,
        }
    }

    pub const fn section(&self, section: Section) -> SectionState {
        match section {
            Section::Shipping => self.shipping,
            Section::Carrier => self.carrier,
            Section::Payment => self.payment,
        }
    }

    pub fn is_initial(&self) -> bool {
        self.shipping == SectionState::Expanded
            && self.carrier == SectionState::Hidden
            && self.payment == SectionState::Hidden
    }

    /// Payment section is open; the handoff may start
    pub fn ready_for_payment(&self) -> bool {
        self.payment == SectionState::Expanded && self.address.is_some()
    }
}

impl Default for CheckoutState {
    fn default() -> Self {
        let carrier = Carrier::options()
            .into_iter()
            .next()
            .unwrap_or_else(|| Carrier::new("Standard Post", rust_decimal::Decimal::ZERO));
        Self::new(carrier)
    }
}

/// User intents
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckoutAction {
    /// Submit the shipping form
    ChooseCarrier(ShippingAddress),
    SelectCarrier(Carrier),
    ContinueCheckout,
    /// Back to the very start, whatever the current state
    ChangeShipping,
    ChangeCarrier,
}

/// What a successful `reduce` did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// The named section is now the expanded one
    Opened(Section),
    /// Carrier switched, sections unchanged
    CarrierSelected,
    /// Returned to the initial state
    Reset,
    /// Not applicable in the current state
    Ignored,
}

/// Required fields non-empty; phone, when given, must look like a number
pub fn validate_shipping(address: &ShippingAddress) -> Result<()> {
    let mut errors = FieldErrors::new();

    let required = [
        ("first_name", &address.first_name),
        ("last_name", &address.last_name),
        ("address_line1", &address.address_line1),
        ("region", &address.region),
        ("country", &address.country),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            errors.add(field, "required");
        }
    }

    if let Some(phone) = address.phone.as_deref().filter(|p| !p.trim().is_empty()) {
        if let Err(message) = validate_phone(phone) {
            errors.add("phone", message);
        }
    }

    errors.into_result()
}

/// Apply `action` to `state`
///
/// Validation failures leave `state` untouched.
pub fn reduce(state: &mut CheckoutState, action: CheckoutAction) -> Result<Transition> {
    let transition = match action {
        CheckoutAction::ChooseCarrier(address) => {
            if state.shipping != SectionState::Expanded {
                return Ok(Transition::Ignored);
            }
            validate_shipping(&address)?;
            state.address = Some(address);
            state.shipping = SectionState::Collapsed;
            state.carrier = SectionState::Expanded;
            state.payment = SectionState::Hidden;
            Transition::Opened(Section::Carrier)
        }

        CheckoutAction::SelectCarrier(carrier) => {
            if state.carrier != SectionState::Expanded {
                return Ok(Transition::Ignored);
            }
            state.selected_carrier = carrier;
            Transition::CarrierSelected
        }

        CheckoutAction::ContinueCheckout => {
            if state.carrier != SectionState::Expanded {
                return Ok(Transition::Ignored);
            }
            state.carrier = SectionState::Collapsed;
            state.payment = SectionState::Expanded;
            Transition::Opened(Section::Payment)
        }

        CheckoutAction::ChangeShipping => {
            *state = CheckoutState::new(state.selected_carrier.clone());
            Transition::Reset
        }

        CheckoutAction::ChangeCarrier => {
            if state.carrier == SectionState::Hidden {
                return Ok(Transition::Ignored);
            }
            state.carrier = SectionState::Expanded;
            state.payment = SectionState::Hidden;
            Transition::Opened(Section::Carrier)
        }
    };

    tracing::debug!(?transition, "Checkout transition");
    Ok(transition)
}
