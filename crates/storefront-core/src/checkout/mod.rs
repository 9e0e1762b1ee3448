//! Checkout Flow
//!
//! Collapsible-section wizard for physical goods:
//!
//! ```text
//! ┌──────────┐ choose carrier ┌──────────┐ continue ┌──────────┐
//! │ Shipping │───────────────▶│ Carrier  │─────────▶│ Payment  │──▶ handoff
//! └──────────┘                └──────────┘          └──────────┘
//!      ▲   change shipping (hard reset) │ ◀── change carrier ──┘
//!      └────────────────────────────────┘
//! ```
//!
//! `flow` is a pure reducer over section states; `controller` binds it to
//! the cart, FX rates and storage.

mod controller;
mod flow;

pub use controller::CheckoutController;
pub use flow::{
    CheckoutAction, CheckoutState, Section, SectionState, Transition, reduce, validate_shipping,
};
