//! Seat Hold Timer
//!
//! A hold reserves a seat for a fixed window from the moment the shopper
//! reaches seat selection. The window is never extended. When it runs out the
//! hold, the seat selection and the saved card are cleared together and the
//! shopper is sent back to the eligibility step.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::error::Result;
use crate::model::Page;
use crate::storage::{Scope, Storage, StorageKey, load_json, save_json};

/// Default hold length in seconds
pub const DEFAULT_HOLD_SECS: i64 = 5 * 60;

/// A time-limited seat reservation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatHold {
    /// Seat number or seat class
    pub seat: String,
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of one tick
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HoldTick {
    Running { remaining: Duration, display: String },
    /// The hold just expired and its state was cleared
    Evicted { redirect: Page },
    /// No hold to count down
    Inactive,
}

/// Render as mm:ss, rounding partial seconds up
pub fn format_remaining(remaining: Duration) -> String {
    let millis = remaining.num_milliseconds().max(0);
    let secs = millis.saturating_add(999) / 1000;
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Countdown over the persisted seat hold
pub struct HoldTimer {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    duration: Duration,
    hold: Option<SeatHold>,
}

impl HoldTimer {
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        Self::with_duration(storage, clock, Duration::seconds(DEFAULT_HOLD_SECS))
    }

    pub fn with_duration(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>, duration: Duration) -> Self {
        let hold = load_json(storage.as_ref(), Scope::Session, StorageKey::SeatHold);
        Self {
            storage,
            clock,
            duration,
            hold,
        }
    }

    pub const fn hold(&self) -> Option<&SeatHold> {
        self.hold.as_ref()
    }

    /// Seat chosen in this session, if any
    pub fn seat_selection(&self) -> Option<String> {
        load_json(self.storage.as_ref(), Scope::Session, StorageKey::SeatSelection)
    }

    /// Reach seat selection: resume an unexpired hold or start a fresh one
    pub fn enter(&mut self, seat: &str) -> Result<SeatHold> {
        let now = self.clock.now();
        let stored: Option<SeatHold> = load_json(self.storage.as_ref(), Scope::Session, StorageKey::SeatHold);

        let hold = match stored {
            Some(existing) if existing.expires_at > now => {
                tracing::debug!(session_id = %existing.session_id, "Resuming seat hold");
                SeatHold {
                    seat: seat.to_string(),
                    ..existing
                }
            }
            _ => {
                let hold = SeatHold {
                    seat: seat.to_string(),
                    session_id: uuid::Uuid::new_v4().to_string(),
                    expires_at: now + self.duration,
                };
                tracing::info!(
                    session_id = %hold.session_id,
                    seat = %hold.seat,
                    expires_at = %hold.expires_at,
                    "Seat hold created"
                );
                hold
            }
        };

        save_json(self.storage.as_ref(), Scope::Session, StorageKey::SeatHold, &hold)?;
        save_json(self.storage.as_ref(), Scope::Session, StorageKey::SeatSelection, &hold.seat)?;
        self.hold = Some(hold.clone());
        Ok(hold)
    }

    /// Time left, zero once expired
    pub fn remaining(&self) -> Option<Duration> {
        let hold = self.hold.as_ref()?;
        Some((hold.expires_at - self.clock.now()).max(Duration::zero()))
    }

    /// Recompute the countdown; evicts exactly once when it reaches zero
    pub fn tick(&mut self) -> HoldTick {
        let Some(remaining) = self.remaining() else {
            return HoldTick::Inactive;
        };

        if remaining > Duration::zero() {
            return HoldTick::Running {
                remaining,
                display: format_remaining(remaining),
            };
        }

        let session_id = self.hold.as_ref().map(|h| h.session_id.clone()).unwrap_or_default();
        self.clear(&[
            (Scope::Session, StorageKey::SeatHold),
            (Scope::Session, StorageKey::SeatSelection),
            (Scope::Durable, StorageKey::SavedCard),
        ]);
        tracing::info!(session_id = %session_id, "Seat hold expired, returning to eligibility");

        HoldTick::Evicted {
            redirect: Page::Eligibility,
        }
    }

    /// Shopper abandoned seat selection
    pub fn cancel(&mut self) {
        tracing::info!("Seat hold cancelled");
        self.clear(&[
            (Scope::Session, StorageKey::SeatHold),
            (Scope::Session, StorageKey::SeatSelection),
        ]);
    }

    /// Payment handed off; the hold has served its purpose
    pub fn release_on_handoff(&mut self) {
        tracing::debug!("Seat hold released after handoff");
        release_hold(self.storage.as_ref());
        self.hold = None;
    }

    /// Remove every slot even if one fails; storage errors are logged only
    fn clear(&mut self, slots: &[(Scope, StorageKey)]) {
        self.hold = None;
        for &(scope, key) in slots {
            if let Err(e) = self.storage.remove(scope, key) {
                tracing::warn!(key = %key, error = %e, "Failed to clear hold state");
            }
        }
    }
}

/// Drop the persisted hold and seat selection
pub fn release_hold(storage: &dyn Storage) {
    for key in [StorageKey::SeatHold, StorageKey::SeatSelection] {
        if let Err(e) = storage.remove(Scope::Session, key) {
            tracing::warn!(key = %key, error = %e, "Failed to release seat hold");
        }
    }
}

/// Once-per-second driver for a `HoldTimer`
///
/// Ticks are delivered on a channel. The task stops after an eviction and is
/// aborted when the ticker is dropped with its page.
pub struct HoldTicker {
    task: JoinHandle<()>,
}

impl HoldTicker {
    pub fn spawn(timer: Arc<Mutex<HoldTimer>>) -> (Self, mpsc::Receiver<HoldTick>) {
        let (tx, rx) = mpsc::channel(8);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
            loop {
                interval.tick().await;
                let tick = timer.lock().await.tick();
                let done = !matches!(tick, HoldTick::Running { .. });
                if tx.send(tick).await.is_err() || done {
                    break;
                }
            }
        });

        (Self { task }, rx)
    }

    pub fn stop(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for HoldTicker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::eligibility::SavedCard;
    use crate::storage::MemoryStorage;

    struct Fixture {
        storage: Arc<dyn Storage>,
        clock: ManualClock,
        start: DateTime<Utc>,
    }

    impl Fixture {
        fn new() -> Self {
            let start = Utc::now();
            Self {
                storage: Arc::new(MemoryStorage::new()),
                clock: ManualClock::new(start),
                start,
            }
        }

        fn timer(&self, duration: Duration) -> HoldTimer {
            HoldTimer::with_duration(self.storage.clone(), Arc::new(self.clock.clone()), duration)
        }

        fn save_card(&self) {
            let card = SavedCard {
                token: "tok_123".into(),
                scheme: "Visa".into(),
                last4: "4242".into(),
                expiry_month: 9,
                expiry_year: 2029,
                saved_at: self.start,
            };
            save_json(self.storage.as_ref(), Scope::Durable, StorageKey::SavedCard, &card).unwrap();
        }
    }

    #[test]
    fn test_countdown_display() {
        let fx = Fixture::new();
        let mut timer = fx.timer(Duration::seconds(DEFAULT_HOLD_SECS));
        timer.enter("A12").unwrap();

        assert!(matches!(timer.tick(), HoldTick::Running { ref display, .. } if display == "05:00"));

        fx.clock.set(fx.start + Duration::seconds(4 * 60 + 59));
        assert!(matches!(timer.tick(), HoldTick::Running { ref display, .. } if display == "00:01"));

        // Last partial second still reads 00:01
        fx.clock.set(fx.start + Duration::milliseconds(299_500));
        assert!(matches!(timer.tick(), HoldTick::Running { ref display, .. } if display == "00:01"));

        fx.clock.set(fx.start + Duration::minutes(5));
        assert_eq!(timer.tick(), HoldTick::Evicted { redirect: Page::Eligibility });
        assert_eq!(timer.tick(), HoldTick::Inactive);
    }

    #[test]
    fn test_release_on_handoff_keeps_saved_card() {
        let fx = Fixture::new();
        fx.save_card();
        let mut timer = fx.timer(Duration::minutes(5));
        timer.enter("A12").unwrap();

        timer.release_on_handoff();
        assert!(timer.hold().is_none());
        assert!(timer.seat_selection().is_none());
        assert_eq!(timer.tick(), HoldTick::Inactive);
        assert!(fx.storage.get(Scope::Session, StorageKey::SeatHold).unwrap().is_none());
        assert!(fx.storage.get(Scope::Durable, StorageKey::SavedCard).unwrap().is_some());
    }

    #[test]
    fn test_eviction_happens_once_and_clears_state() {
        let fx = Fixture::new();
        fx.save_card();
        let mut timer = fx.timer(Duration::milliseconds(5000));
        timer.enter("VIP").unwrap();

        fx.clock.advance(Duration::milliseconds(5000));
        let ticks: Vec<HoldTick> = (0..3).map(|_| timer.tick()).collect();
        let evictions = ticks.iter().filter(|t| matches!(t, HoldTick::Evicted { .. })).count();
        assert_eq!(evictions, 1);

        assert!(timer.hold().is_none());
        assert!(timer.seat_selection().is_none());
        assert!(fx.storage.get(Scope::Session, StorageKey::SeatHold).unwrap().is_none());
        assert!(fx.storage.get(Scope::Durable, StorageKey::SavedCard).unwrap().is_none());
    }

    #[test]
    fn test_reentry_resumes_unexpired_hold() {
        let fx = Fixture::new();
        let first = fx.timer(Duration::minutes(5)).enter("A12").unwrap();

        fx.clock.advance(Duration::minutes(2));
        // New page load
        let mut timer = fx.timer(Duration::minutes(5));
        let resumed = timer.enter("A14").unwrap();

        assert_eq!(resumed.expires_at, first.expires_at);
        assert_eq!(resumed.session_id, first.session_id);
        assert_eq!(timer.seat_selection().as_deref(), Some("A14"));
        assert_eq!(timer.remaining(), Some(Duration::minutes(3)));
    }

    #[test]
    fn test_reentry_after_expiry_starts_fresh() {
        let fx = Fixture::new();
        let first = fx.timer(Duration::minutes(5)).enter("A12").unwrap();

        fx.clock.advance(Duration::minutes(6));
        let fresh = fx.timer(Duration::minutes(5)).enter("A12").unwrap();

        assert_ne!(fresh.session_id, first.session_id);
        assert_eq!(fresh.expires_at, fx.clock.now() + Duration::minutes(5));
    }

    #[test]
    fn test_cancel_keeps_saved_card() {
        let fx = Fixture::new();
        fx.save_card();
        let mut timer = fx.timer(Duration::minutes(5));
        timer.enter("A12").unwrap();

        timer.cancel();
        assert_eq!(timer.tick(), HoldTick::Inactive);
        assert!(fx.storage.get(Scope::Durable, StorageKey::SavedCard).unwrap().is_some());
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(Duration::seconds(300)), "05:00");
        assert_eq!(format_remaining(Duration::milliseconds(59_999)), "01:00");
        assert_eq!(format_remaining(Duration::milliseconds(1)), "00:01");
        assert_eq!(format_remaining(Duration::seconds(-3)), "00:00");
    }

    /// Wall time that follows tokio's paused clock
    struct TokioClock {
        base: DateTime<Utc>,
        start: tokio::time::Instant,
    }

    impl Clock for TokioClock {
        fn now(&self) -> DateTime<Utc> {
            let elapsed = tokio::time::Instant::now() - self.start;
            self.base + Duration::from_std(elapsed).unwrap_or_else(|_| Duration::zero())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_runs_until_eviction() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let clock = Arc::new(TokioClock {
            base: Utc::now(),
            start: tokio::time::Instant::now(),
        });
        let mut timer = HoldTimer::with_duration(storage, clock, Duration::seconds(3));
        timer.enter("A12").unwrap();

        let (ticker, mut ticks) = HoldTicker::spawn(Arc::new(Mutex::new(timer)));

        let mut seen = Vec::new();
        while let Some(tick) = ticks.recv().await {
            seen.push(tick);
        }

        let displays: Vec<&str> = seen
            .iter()
            .filter_map(|t| match t {
                HoldTick::Running { display, .. } => Some(display.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(displays, vec!["00:03", "00:02", "00:01"]);
        assert_eq!(seen.last(), Some(&HoldTick::Evicted { redirect: Page::Eligibility }));

        tokio::task::yield_now().await;
        assert!(ticker.is_finished());
    }
}
