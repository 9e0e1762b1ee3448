//! Optional card saving
//!
//! When the shopper opts in, the full card is tokenized by the processor and
//! the token is kept in a single durable slot. Saving again replaces it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::gate::card_digits;
use crate::error::{FieldErrors, Result};
use crate::gateway::{CardDetails, Tokenizer};
use crate::storage::{Scope, Storage, StorageKey, load_json, save_json};

/// Card fields as typed
#[derive(Clone, Debug, Default)]
pub struct SaveCardForm {
    pub number: String,
    /// "MM/YY" or "MM/YYYY"
    pub expiry: String,
    pub cvv: String,
    pub name: String,
}

/// Parse "MM/YY" or "MM/YYYY"; two-digit years are 20YY
pub fn parse_expiry(expiry: &str) -> std::result::Result<(u32, i32), &'static str> {
    let (month, year) = expiry
        .trim()
        .split_once('/')
        .ok_or("expiry must look like MM/YY")?;

    let month: u32 = month.trim().parse().map_err(|_| "expiry month is not a number")?;
    if !(1..=12).contains(&month) {
        return Err("expiry month must be 01-12");
    }

    let year = year.trim();
    let parsed: i32 = year.parse().map_err(|_| "expiry year is not a number")?;
    let year = match year.len() {
        2 => 2000 + parsed,
        4 => parsed,
        _ => return Err("expiry year must have 2 or 4 digits"),
    };
    if !(2000..=2099).contains(&year) {
        return Err("expiry year is not plausible");
    }

    Ok((month, year))
}

/// Check every field, reporting all problems together
pub fn validate_card_form(form: &SaveCardForm) -> Result<CardDetails> {
    let mut errors = FieldErrors::new();

    let number = card_digits(&form.number);
    if number.len() < 12 || number.len() > 19 {
        errors.add("number", "card number must have 12 to 19 digits");
    }

    let expiry = parse_expiry(&form.expiry);
    if let Err(message) = expiry {
        errors.add("expiry", message);
    }

    let cvv = form.cvv.trim();
    if !(3..=4).contains(&cvv.len()) || !cvv.chars().all(|c| c.is_ascii_digit()) {
        errors.add("cvv", "security code must be 3 or 4 digits");
    }

    let name = form.name.trim();
    if name.is_empty() {
        errors.add("name", "required");
    }

    errors.into_result()?;
    let (expiry_month, expiry_year) = expiry.unwrap_or_default();

    Ok(CardDetails {
        number,
        expiry_month,
        expiry_year,
        cvv: cvv.to_string(),
        name: name.to_string(),
    })
}

/// The one saved card
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedCard {
    pub token: String,
    pub scheme: String,
    pub last4: String,
    pub expiry_month: u32,
    pub expiry_year: i32,
    pub saved_at: DateTime<Utc>,
}

/// Single-slot saved card storage
#[derive(Clone)]
pub struct CardVault {
    storage: Arc<dyn Storage>,
}

impl CardVault {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn saved(&self) -> Option<SavedCard> {
        load_json(self.storage.as_ref(), Scope::Durable, StorageKey::SavedCard)
    }

    /// Validate, tokenize and store, replacing any previous card
    pub async fn save(
        &self,
        tokenizer: &dyn Tokenizer,
        form: &SaveCardForm,
        now: DateTime<Utc>,
    ) -> Result<SavedCard> {
        let details = validate_card_form(form)?;
        let tokenized = tokenizer.tokenize_card(&details).await?;

        let card = SavedCard {
            token: tokenized.token,
            scheme: tokenized.scheme,
            last4: tokenized.last4,
            expiry_month: tokenized.expiry_month,
            expiry_year: tokenized.expiry_year,
            saved_at: now,
        };
        save_json(self.storage.as_ref(), Scope::Durable, StorageKey::SavedCard, &card)?;
        tracing::info!(scheme = %card.scheme, last4 = %card.last4, "Card saved");
        Ok(card)
    }

    pub fn clear(&self) -> Result<()> {
        self.storage.remove(Scope::Durable, StorageKey::SavedCard)
    }
}
