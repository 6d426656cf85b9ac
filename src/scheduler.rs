//! Cooldown-gated clearing of the embedded editor's backend cache.
//!
//! Each dashboard render calls [`maybe_clear_cache`]. The backend is cleared
//! when no clear has happened yet or when the cooldown since the last
//! successful clear has elapsed; otherwise the call is a no-op.
//!
//! # Invariants
//! - `last_cleared` is written only after `BackendCache::clear` succeeds, so a
//!   failed clear is retried by the next render.
//! - The compare-clear-write sequence runs under the state's mutex: at most one
//!   clear per cooldown window within a process.
//! - State is owned by whoever hosts the dashboard and passed in explicitly.

use crate::error::CacheClearError;
use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, error, info};
use std::sync::Mutex;

/// Default minimum interval between backend clears
pub const DEFAULT_COOLDOWN_HOURS: i64 = 12;

/// A cache whose entries can be dropped wholesale
pub trait BackendCache: Send + Sync {
    fn clear(&self) -> Result<(), CacheClearError>;
}

/// Wall-clock source, replaceable in tests
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SchedulerPhase {
    /// Last clear is within the cooldown window
    Cooling,

    /// Never cleared, or the window has elapsed
    Expired,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClearOutcome {
    Cleared { at: DateTime<Utc> },
    Cooling { next_due: DateTime<Utc> },
}

/// Time of the last successful clear plus the cooldown to enforce
#[derive(Debug)]
pub struct SchedulerState {
    cooldown: TimeDelta,
    last_cleared: Mutex<Option<DateTime<Utc>>>,
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self::new(TimeDelta::hours(DEFAULT_COOLDOWN_HOURS))
    }
}

impl SchedulerState {
    pub fn new(cooldown: TimeDelta) -> Self {
        SchedulerState {
            cooldown,
            last_cleared: Mutex::new(None),
        }
    }

    /// State that behaves as if a clear already happened at `at`
    pub fn cleared_at(cooldown: TimeDelta, at: DateTime<Utc>) -> Self {
        SchedulerState {
            cooldown,
            last_cleared: Mutex::new(Some(at)),
        }
    }

    pub fn cooldown(&self) -> TimeDelta {
        self.cooldown
    }

    pub fn last_cleared(&self) -> Option<DateTime<Utc>> {
        *self.last_cleared.lock().unwrap_or_else(|p| p.into_inner())
    }
}

// A due time past the representable range never arrives
fn due_after(last: DateTime<Utc>, cooldown: TimeDelta) -> DateTime<Utc> {
    last.checked_add_signed(cooldown).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn phase_of(
    last: Option<DateTime<Utc>>,
    cooldown: TimeDelta,
    now: DateTime<Utc>,
) -> SchedulerPhase {
    match last {
        Some(last) if now < due_after(last, cooldown) => SchedulerPhase::Cooling,
        _ => SchedulerPhase::Expired,
    }
}

/// Clears `backend` if the cooldown recorded in `state` has elapsed at `now`
///
/// # Errors
/// Returns the backend's `CacheClearError` unchanged; `state` is left as it
/// was so the next call tries again.
pub fn maybe_clear_cache<B>(
    state: &SchedulerState,
    backend: &B,
    now: DateTime<Utc>,
) -> Result<ClearOutcome, CacheClearError>
where
    B: BackendCache + ?Sized,
{
    let mut last = state.last_cleared.lock().unwrap_or_else(|p| p.into_inner());

    let phase = phase_of(*last, state.cooldown, now);
    if let (SchedulerPhase::Cooling, Some(prev)) = (phase, *last) {
        let next_due = due_after(prev, state.cooldown);
        debug!("backend cache clear cooling until {}", next_due);
        return Ok(ClearOutcome::Cooling { next_due });
    }

    if let Err(err) = backend.clear() {
        error!("backend cache clear failed: {}", err);
        return Err(err);
    }

    *last = Some(now);
    info!("backend cache cleared at {}", now);
    Ok(ClearOutcome::Cleared { at: now })
}
