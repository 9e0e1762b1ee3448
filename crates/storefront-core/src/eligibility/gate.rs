//! Debounced BIN probing
//!
//! Every keystroke bumps a generation counter. A probe result is applied only
//! if its ticket still carries the latest generation, so a slow response for
//! an old card number can never overwrite the state for the current one.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::criteria::{CriterionFailure, EligibilityCriteria, check_eligibility};
use crate::error::Result;
use crate::gateway::{CardMetadataService, CardProbeResult, ProbeKind};

/// Quiet time after the last keystroke before probing
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(400);

/// Digits of a typed card number, separators dropped
pub fn card_digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// What the eligibility step currently shows
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GateStatus {
    /// Not enough digits yet
    Idle,
    /// Probe scheduled or in flight
    Pending { bin: String },
    /// Rest of the form revealed, continuation enabled
    Eligible { card: CardProbeResult },
    /// Continuation blocked, failing criteria listed
    Ineligible {
        card: CardProbeResult,
        failures: Vec<CriterionFailure>,
    },
    /// Lookup failed; treated as ineligible
    Failed { message: String },
}

impl GateStatus {
    pub const fn can_continue(&self) -> bool {
        matches!(self, Self::Eligible { .. })
    }
}

/// A scheduled probe
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeTicket {
    generation: u64,
    /// Digits to send to the lookup
    pub input: String,
    pub bin: String,
}

/// Eligibility state for one presale attempt
pub struct EligibilityGate {
    kind: ProbeKind,
    criteria: EligibilityCriteria,
    generation: u64,
    /// BIN and result of the last successful probe
    last_probe: Option<CardProbeResult>,
    status: GateStatus,
}

impl EligibilityGate {
    pub const fn new(kind: ProbeKind, criteria: EligibilityCriteria) -> Self {
        Self {
            kind,
            criteria,
            generation: 0,
            last_probe: None,
            status: GateStatus::Idle,
        }
    }

    pub const fn kind(&self) -> ProbeKind {
        self.kind
    }

    pub const fn status(&self) -> &GateStatus {
        &self.status
    }

    pub const fn criteria(&self) -> &EligibilityCriteria {
        &self.criteria
    }

    /// Swap criteria and re-judge the last probe, if any
    pub fn set_criteria(&mut self, criteria: EligibilityCriteria) {
        self.criteria = criteria;
        if let Some(card) = self.last_probe.clone() {
            if !matches!(self.status, GateStatus::Pending { .. } | GateStatus::Idle) {
                self.status = self.judge(card);
            }
        }
    }

    /// Register typed input; returns a ticket when a probe is needed
    pub fn keystroke(&mut self, raw: &str) -> Option<ProbeTicket> {
        self.generation += 1;

        let digits = card_digits(raw);
        if digits.len() < self.kind.min_digits() {
            self.status = GateStatus::Idle;
            return None;
        }

        let bin = digits[..self.kind.bin_len()].to_string();

        if let Some(card) = self.last_probe.clone().filter(|c| c.bin == bin) {
            tracing::debug!(bin = %bin, "BIN unchanged, reusing last probe");
            self.status = self.judge(card);
            return None;
        }

        self.status = GateStatus::Pending { bin: bin.clone() };
        let input = match self.kind {
            ProbeKind::FullPan => digits,
            ProbeKind::BinOnly => bin.clone(),
        };
        Some(ProbeTicket {
            generation: self.generation,
            input,
            bin,
        })
    }

    /// Whether no keystroke has happened since `ticket` was issued
    pub const fn is_current(&self, ticket: &ProbeTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Apply a probe outcome; stale tickets are dropped (returns `false`)
    pub fn resolve(&mut self, ticket: &ProbeTicket, outcome: Result<CardProbeResult>) -> bool {
        if !self.is_current(ticket) {
            tracing::debug!(bin = %ticket.bin, "Discarding stale probe response");
            return false;
        }

        self.status = match outcome {
            Ok(card) if card.scheme.trim().is_empty() => GateStatus::Failed {
                message: "card lookup returned no scheme".into(),
            },
            Ok(mut card) => {
                card.bin = ticket.bin.clone();
                self.last_probe = Some(card.clone());
                self.judge(card)
            }
            Err(e) => {
                tracing::warn!(bin = %ticket.bin, error = %e, "Card probe failed");
                GateStatus::Failed { message: e.to_string() }
            }
        };
        true
    }

    fn judge(&self, card: CardProbeResult) -> GateStatus {
        let decision = check_eligibility(&card, &self.criteria);
        if decision.is_eligible() {
            tracing::info!(bin = %card.bin, scheme = %card.scheme, "Card eligible for presale");
            GateStatus::Eligible { card }
        } else {
            tracing::info!(bin = %card.bin, failures = decision.failures.len(), "Card not eligible");
            GateStatus::Ineligible {
                card,
                failures: decision.failures,
            }
        }
    }
}

/// Runs the debounce and probe for each keystroke
pub struct ProbeDriver {
    gate: Arc<Mutex<EligibilityGate>>,
    service: Arc<dyn CardMetadataService>,
    quiet: Duration,
}

impl ProbeDriver {
    pub fn new(gate: EligibilityGate, service: Arc<dyn CardMetadataService>) -> Self {
        Self {
            gate: Arc::new(Mutex::new(gate)),
            service,
            quiet: DEFAULT_QUIET_PERIOD,
        }
    }

    #[must_use]
    pub const fn with_quiet_period(mut self, quiet: Duration) -> Self {
        self.quiet = quiet;
        self
    }

    pub async fn status(&self) -> GateStatus {
        self.gate.lock().await.status().clone()
    }

    pub async fn set_criteria(&self, criteria: EligibilityCriteria) {
        self.gate.lock().await.set_criteria(criteria);
    }

    /// Handle one input event; resolves once this keystroke's work is done
    ///
    /// Superseded keystrokes return early without touching the network.
    pub async fn on_input(&self, raw: &str) -> GateStatus {
        let (ticket, kind) = {
            let mut gate = self.gate.lock().await;
            (gate.keystroke(raw), gate.kind())
        };
        let Some(ticket) = ticket else {
            return self.status().await;
        };

        tokio::time::sleep(self.quiet).await;
        if !self.gate.lock().await.is_current(&ticket) {
            return self.status().await;
        }

        let outcome = self.service.probe_card_metadata(&ticket.input, kind).await;

        let mut gate = self.gate.lock().await;
        gate.resolve(&ticket, outcome);
        gate.status().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eligibility::Scheme;
    use crate::error::StorefrontError;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    fn probe(bin: &str, scheme: &str) -> CardProbeResult {
        CardProbeResult {
            bin: bin.into(),
            scheme: scheme.into(),
            card_type: "credit".into(),
            issuer: "HSBC".into(),
            issuer_country: "HK".into(),
        }
    }

    /// Answers by leading digit and records every call
    #[derive(Default)]
    struct FakeLookup {
        calls: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl CardMetadataService for FakeLookup {
        async fn probe_card_metadata(&self, pan_or_bin: &str, _kind: ProbeKind) -> Result<CardProbeResult> {
            self.calls.lock().unwrap().push(pan_or_bin.to_string());
            match pan_or_bin.chars().next() {
                Some('4') => Ok(probe(&pan_or_bin[..6], "Visa")),
                Some('5') => Ok(probe(&pan_or_bin[..6], "Mastercard")),
                _ => Err(StorefrontError::Probe("card_number_invalid".into())),
            }
        }
    }

    #[test]
    fn test_bin_411111_visa() {
        let mut gate = EligibilityGate::new(ProbeKind::BinOnly, EligibilityCriteria::scheme(Scheme::Visa));
        let ticket = gate.keystroke("411111").unwrap();
        assert!(gate.resolve(&ticket, Ok(probe("411111", "visa"))));
        assert!(gate.status().can_continue());

        let mut gate =
            EligibilityGate::new(ProbeKind::BinOnly, EligibilityCriteria::scheme(Scheme::Mastercard));
        let ticket = gate.keystroke("411111").unwrap();
        gate.resolve(&ticket, Ok(probe("411111", "visa")));
        assert!(matches!(gate.status(), GateStatus::Ineligible { .. }));
        assert!(!gate.status().can_continue());
    }

    #[test]
    fn test_no_probe_below_minimum_length() {
        let mut gate = EligibilityGate::new(ProbeKind::FullPan, EligibilityCriteria::default());
        assert!(gate.keystroke("4111 1111 1111").is_none());
        assert_eq!(gate.status(), &GateStatus::Idle);

        let ticket = gate.keystroke("4111 1111 1111 1111").unwrap();
        assert_eq!(ticket.input, "4111111111111111");
        assert_eq!(ticket.bin, "41111111");
    }

    #[test]
    fn test_unchanged_bin_is_not_reprobed() {
        let mut gate = EligibilityGate::new(ProbeKind::FullPan, EligibilityCriteria::default());
        let ticket = gate.keystroke("4111111111111111").unwrap();
        gate.resolve(&ticket, Ok(probe("41111111", "visa")));

        assert!(gate.keystroke("4111111111111112").is_none());
        assert!(gate.status().can_continue());

        assert!(gate.keystroke("4222111111111111").is_some());
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let mut gate = EligibilityGate::new(ProbeKind::BinOnly, EligibilityCriteria::scheme(Scheme::Visa));
        let first = gate.keystroke("555555").unwrap();
        let second = gate.keystroke("411111").unwrap();

        assert!(gate.resolve(&second, Ok(probe("411111", "visa"))));
        assert!(!gate.resolve(&first, Ok(probe("555555", "mastercard"))));
        assert!(gate.status().can_continue());
    }

    #[test]
    fn test_probe_error_is_failed_state() {
        let mut gate = EligibilityGate::new(ProbeKind::BinOnly, EligibilityCriteria::default());
        let ticket = gate.keystroke("999999").unwrap();
        gate.resolve(&ticket, Err(StorefrontError::Probe("timeout".into())));
        assert!(matches!(gate.status(), GateStatus::Failed { message } if message.contains("timeout")));

        // Retrying the same BIN probes again
        assert!(gate.keystroke("999999").is_some());
    }

    #[test]
    fn test_insufficient_probe_data_fails() {
        let mut gate = EligibilityGate::new(ProbeKind::BinOnly, EligibilityCriteria::default());
        let ticket = gate.keystroke("411111").unwrap();
        gate.resolve(&ticket, Ok(probe("411111", "")));
        assert!(matches!(gate.status(), GateStatus::Failed { .. }));
    }

    #[test]
    fn test_changing_criteria_rejudges() {
        let mut gate = EligibilityGate::new(ProbeKind::BinOnly, EligibilityCriteria::default());
        let ticket = gate.keystroke("411111").unwrap();
        gate.resolve(&ticket, Ok(probe("411111", "visa")));
        assert!(gate.status().can_continue());

        gate.set_criteria(EligibilityCriteria::scheme(Scheme::Jcb));
        assert!(!gate.status().can_continue());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_probes_only_last_input() {
        let lookup = Arc::new(FakeLookup::default());
        let driver = Arc::new(ProbeDriver::new(
            EligibilityGate::new(ProbeKind::FullPan, EligibilityCriteria::scheme(Scheme::Mastercard)),
            lookup.clone(),
        ));

        let first = tokio::spawn({
            let driver = driver.clone();
            async move { driver.on_input("4111 1111 1111 1111").await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        let second = tokio::spawn({
            let driver = driver.clone();
            async move { driver.on_input("5555 5555 5555 4444").await }
        });

        first.await.unwrap();
        let status = second.await.unwrap();

        assert!(status.can_continue());
        assert_eq!(*lookup.calls.lock().unwrap(), vec!["5555555555554444".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_error_surfaces_as_failed() {
        let driver = ProbeDriver::new(
            EligibilityGate::new(ProbeKind::BinOnly, EligibilityCriteria::default()),
            Arc::new(FakeLookup::default()),
        )
        .with_quiet_period(Duration::from_millis(250));

        let status = driver.on_input("300000").await;
        assert!(matches!(status, GateStatus::Failed { .. }));
    }
}
