//! Domain Models
//!
//! Core data types shared by the cart, checkout and presale flows.
//! Uses `rust_decimal` for all monetary values - never use f64 for money!

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Currencies the storefront can display and settle in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Hkd,
    Usd,
    Cny,
    Jpy,
    Eur,
    Gbp,
    Sgd,
}

impl Currency {
    /// Prices in the catalog are defined in this currency
    pub const CANONICAL: Self = Self::Hkd;

    pub const ALL: [Self; 7] = [
        Self::Hkd,
        Self::Usd,
        Self::Cny,
        Self::Jpy,
        Self::Eur,
        Self::Gbp,
        Self::Sgd,
    ];

    pub const fn code(self) -> &'static str {
        match self {
            Self::Hkd => "HKD",
            Self::Usd => "USD",
            Self::Cny => "CNY",
            Self::Jpy => "JPY",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
            Self::Sgd => "SGD",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(code.trim()))
    }

    /// Decimal places of the smallest unit (JPY has none)
    pub const fn minor_unit_exponent(self) -> u32 {
        match self {
            Self::Jpy => 0,
            _ => 2,
        }
    }

    /// Round a display amount to this currency's precision
    pub fn round(self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(self.minor_unit_exponent(), RoundingStrategy::MidpointAwayFromZero)
    }

    /// Convert a major-unit amount into integer minor units (cents)
    pub fn to_minor_units(self, amount: Decimal) -> i64 {
        let scaled = amount * Decimal::from(10_i64.pow(self.minor_unit_exponent()));
        // i64 overflow would need amounts beyond any real order
        scaled
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(i64::MAX)
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::CANONICAL
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// What kind of goods a line item is
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    #[default]
    Physical,
    Digital,
}

/// Personalisation carried by digital goods (gift cards)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalMeta {
    pub design: String,
    pub recipient: String,
    pub sender: String,
    #[serde(default)]
    pub message: String,
}

/// A line in the cart
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    /// Catalog identifier
    pub id: String,

    /// Display name; the cart merges lines by name
    pub name: String,

    /// Price in the canonical currency
    pub unit_price_canonical: Decimal,

    /// Price as shown when the item was added
    pub display_price: Decimal,

    /// Currency `display_price` is expressed in
    pub display_currency: Currency,

    /// Always at least 1 while the item is in a cart
    pub quantity: u32,

    #[serde(default)]
    pub kind: ItemKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digital_meta: Option<DigitalMeta>,
}

impl CartItem {
    /// A physical item priced the same in display and canonical currency
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        price: Decimal,
        currency: Currency,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            unit_price_canonical: price,
            display_price: price,
            display_currency: currency,
            quantity: 1,
            kind: ItemKind::Physical,
            digital_meta: None,
        }
    }

    /// Turn this into a digital item with personalisation
    #[must_use]
    pub fn digital(mut self, meta: DigitalMeta) -> Self {
        self.kind = ItemKind::Digital;
        self.digital_meta = Some(meta);
        self
    }

    /// Display price times quantity
    pub fn line_total(&self) -> Decimal {
        self.display_price * Decimal::from(self.quantity)
    }
}

/// Where physical goods are shipped
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    pub region: String,
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl ShippingAddress {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}

/// Shipping option with its fee in the canonical currency
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Carrier {
    pub name: String,
    pub fee: Decimal,
}

impl Carrier {
    pub fn new(name: impl Into<String>, fee: Decimal) -> Self {
        Self {
            name: name.into(),
            fee,
        }
    }

    /// Carriers offered at checkout; the first is pre-selected
    pub fn options() -> Vec<Self> {
        vec![
            Self::new("Standard Post", Decimal::from(30)),
            Self::new("Express Courier", Decimal::from(80)),
            Self::new("Store Pickup", Decimal::ZERO),
        ]
    }
}

/// Customer details sent with a payment
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Processor-side id for returning customers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Storefront pages a flow can navigate to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    Shop,
    Cart,
    Checkout,
    Eligibility,
    SeatSelection,
    Payment,
    Success,
}

impl Page {
    pub const fn path(self) -> &'static str {
        match self {
            Self::Shop => "/index.html",
            Self::Cart => "/cart.html",
            Self::Checkout => "/checkout.html",
            Self::Eligibility => "/tickets/eligibility.html",
            Self::SeatSelection => "/tickets/seats.html",
            Self::Payment => "/tickets/payment.html",
            Self::Success => "/success.html",
        }
    }
}
