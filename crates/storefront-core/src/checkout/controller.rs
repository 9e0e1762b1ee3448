//! Checkout page controller

use rust_decimal::Decimal;

use super::flow::{CheckoutAction, CheckoutState, Transition, reduce};
use crate::cart::CartStore;
use crate::currency::FxAdapter;
use crate::error::{Result, StorefrontError};
use crate::model::{Carrier, Currency, Page, ShippingAddress};
use crate::session::ShopperSession;

/// Binds the checkout reducer to the shopper's stored data
pub struct CheckoutController {
    state: CheckoutState,
    carriers: Vec<Carrier>,
    session: ShopperSession,
}

impl CheckoutController {
    /// Fresh wizard; the first carrier option is pre-selected
    pub fn new(session: ShopperSession, carriers: Vec<Carrier>) -> Result<Self> {
        let default = carriers
            .first()
            .cloned()
            .ok_or_else(|| StorefrontError::Config("no carriers configured".into()))?;

        Ok(Self {
            state: CheckoutState::new(default),
            carriers,
            session,
        })
    }

    /// Open checkout coming from `source`
    pub fn enter(session: ShopperSession, source: Page) -> Result<Self> {
        session.record_checkout_source(source)?;
        Self::new(session, Carrier::options())
    }

    pub const fn state(&self) -> &CheckoutState {
        &self.state
    }

    pub fn carriers(&self) -> &[Carrier] {
        &self.carriers
    }

    /// Saved address to prefill the shipping form with
    pub fn shipping_prefill(&self) -> Option<ShippingAddress> {
        self.state.address.clone().or_else(|| self.session.shipping_profile())
    }

    /// Where the "back" link should go
    pub fn back_target(&self) -> Page {
        self.session.checkout_source().unwrap_or(Page::Cart)
    }

    /// Validate shipping and open the carrier step
    pub fn choose_carrier(&mut self, address: ShippingAddress) -> Result<Transition> {
        let transition = reduce(&mut self.state, CheckoutAction::ChooseCarrier(address))?;
        if let Some(address) = &self.state.address {
            if transition != Transition::Ignored {
                self.session.save_shipping_profile(address)?;
                tracing::info!(country = %address.country, "Shipping confirmed");
            }
        }
        Ok(transition)
    }

    /// Select a carrier by its position in `carriers()`
    pub fn select_carrier(&mut self, index: usize) -> Result<Transition> {
        let carrier = self
            .carriers
            .get(index)
            .cloned()
            .ok_or(StorefrontError::IndexOutOfRange {
                index,
                len: self.carriers.len(),
            })?;
        reduce(&mut self.state, CheckoutAction::SelectCarrier(carrier))
    }

    pub fn continue_checkout(&mut self) -> Result<Transition> {
        reduce(&mut self.state, CheckoutAction::ContinueCheckout)
    }

    pub fn change_shipping(&mut self) -> Result<Transition> {
        reduce(&mut self.state, CheckoutAction::ChangeShipping)
    }

    pub fn change_carrier(&mut self) -> Result<Transition> {
        reduce(&mut self.state, CheckoutAction::ChangeCarrier)
    }

    /// Carrier fee shown in `currency`
    pub fn shipping_fee(&self, fx: &FxAdapter, currency: Currency) -> Decimal {
        fx.convert(self.state.selected_carrier.fee, currency)
    }

    /// Cart total in `currency` plus the selected carrier's fee
    pub fn order_total(&self, cart: &CartStore, fx: &FxAdapter, currency: Currency) -> Decimal {
        cart.total(currency) + self.shipping_fee(fx, currency)
    }
}
