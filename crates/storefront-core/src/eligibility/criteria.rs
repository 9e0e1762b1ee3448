//! Eligibility criteria and matching

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::gateway::CardProbeResult;
use crate::storage::{Scope, Storage, StorageKey, load_json, save_json};

/// Either unrestricted or restricted to one value
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion<T> {
    Any,
    Only(T),
}

impl<T> Default for Criterion<T> {
    fn default() -> Self {
        Self::Any
    }
}

impl<T> Criterion<T> {
    pub const fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

/// Card networks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheme {
    Visa,
    Mastercard,
    Amex,
    UnionPay,
    Jcb,
    Discover,
    DinersClub,
}

impl Scheme {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Visa => "visa",
            Self::Mastercard => "mastercard",
            Self::Amex => "amex",
            Self::UnionPay => "union_pay",
            Self::Jcb => "jcb",
            Self::Discover => "discover",
            Self::DinersClub => "diners_club",
        }
    }

    /// Parse the processor's scheme label ("VISA", "American Express", ...)
    pub fn from_label(label: &str) -> Option<Self> {
        let compact: String = label
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>()
            .to_ascii_lowercase();

        match compact.as_str() {
            "visa" => Some(Self::Visa),
            "mastercard" | "mc" => Some(Self::Mastercard),
            "amex" | "americanexpress" => Some(Self::Amex),
            "unionpay" | "cup" | "chinaunionpay" => Some(Self::UnionPay),
            "jcb" => Some(Self::Jcb),
            "discover" => Some(Self::Discover),
            "diners" | "dinersclub" | "dinersclubinternational" => Some(Self::DinersClub),
            _ => None,
        }
    }
}

/// Card product types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Consumer,
    Commercial,
    Premium,
    Prepaid,
}

/// Presale rule, persisted as a shopper/admin preference
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityCriteria {
    #[serde(default)]
    pub scheme: Criterion<Scheme>,

    /// Issuer name, e.g. "hsbc" or "standard_chartered"
    #[serde(default)]
    pub issuer: Criterion<String>,

    /// Recorded but not matched: probe data does not carry it reliably
    #[serde(default)]
    pub product_type: Criterion<ProductType>,
}

impl EligibilityCriteria {
    pub fn scheme(scheme: Scheme) -> Self {
        Self {
            scheme: Criterion::Only(scheme),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Criterion::Only(issuer.into());
        self
    }
}

/// One unmet criterion
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "criterion", rename_all = "snake_case")]
pub enum CriterionFailure {
    Scheme { expected: Scheme, actual: String },
    Issuer { expected: String, actual: String },
}

impl std::fmt::Display for CriterionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scheme { expected, actual } => {
                write!(f, "card scheme must be {}, got {actual}", expected.as_str())
            }
            Self::Issuer { expected, actual } => {
                write!(f, "issuer must be {expected}, got {actual}")
            }
        }
    }
}

/// Result of matching a probe against criteria
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityDecision {
    pub failures: Vec<CriterionFailure>,
}

impl EligibilityDecision {
    pub fn is_eligible(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Lowercase, underscores as spaces, single-spaced
fn normalize_issuer(text: &str) -> String {
    text.replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Match a probe result against the criteria
///
/// Scheme must be equal; the issuer criterion must appear in the issuer name.
pub fn check_eligibility(result: &CardProbeResult, criteria: &EligibilityCriteria) -> EligibilityDecision {
    let mut failures = Vec::new();

    if let Criterion::Only(expected) = criteria.scheme {
        if Scheme::from_label(&result.scheme) != Some(expected) {
            failures.push(CriterionFailure::Scheme {
                expected,
                actual: result.scheme.clone(),
            });
        }
    }

    if let Criterion::Only(expected) = &criteria.issuer {
        let wanted = normalize_issuer(expected);
        if !wanted.is_empty() && !normalize_issuer(&result.issuer).contains(&wanted) {
            failures.push(CriterionFailure::Issuer {
                expected: expected.clone(),
                actual: result.issuer.clone(),
            });
        }
    }

    EligibilityDecision { failures }
}

/// Durable home of the presale criteria
#[derive(Clone)]
pub struct CriteriaStore {
    storage: Arc<dyn Storage>,
}

impl CriteriaStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Stored criteria, or "any" for everything
    pub fn load(&self) -> EligibilityCriteria {
        load_json(self.storage.as_ref(), Scope::Durable, StorageKey::EligibilityCriteria).unwrap_or_default()
    }

    pub fn save(&self, criteria: &EligibilityCriteria) -> Result<()> {
        tracing::info!(?criteria, "Eligibility criteria updated");
        save_json(self.storage.as_ref(), Scope::Durable, StorageKey::EligibilityCriteria, criteria)
    }
}
