//! Rate resolution policy: held snapshot, single-flight fetches, stale guard.
//!
//! The policy is a plain state machine. It decides whether a request can
//! reuse the held snapshot, must join a fetch already in flight, or needs a
//! new fetch; the session runs the I/O and reports back through the
//! [`FetchTicket`] it was handed. Every new fetch and every invalidation
//! bumps a generation counter, so a ticket from before a base switch can no
//! longer complete.

use std::sync::Arc;

use ratekeeper_common::{CurrencyCode, CurrencySnapshot};

/// Identifies one fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    base: CurrencyCode,
    generation: u64,
}

impl FetchTicket {
    /// Base the fetch was issued for.
    pub fn base(&self) -> &CurrencyCode {
        &self.base
    }

    /// Generation the fetch belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Operational phase of the policy.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyPhase {
    /// No snapshot held and nothing in flight.
    Idle,
    /// A fetch is outstanding.
    Loading(FetchTicket),
    /// A validated snapshot is held for the active base.
    HasSnapshot(Arc<CurrencySnapshot>),
}

/// What the caller must do to satisfy a rate request.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionStep {
    /// Recompute from this held snapshot; no I/O.
    Reuse(Arc<CurrencySnapshot>),
    /// A fetch for the same base is already outstanding.
    Coalesce,
    /// Start a fetch and report back with this ticket.
    Fetch(FetchTicket),
}

/// Decides which rate source to trust for the active base.
#[derive(Debug)]
pub struct RateResolutionPolicy {
    phase: PolicyPhase,
    generation: u64,
}

impl RateResolutionPolicy {
    /// Create an idle policy.
    pub fn new() -> Self {
        Self {
            phase: PolicyPhase::Idle,
            generation: 0,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> &PolicyPhase {
        &self.phase
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Snapshot currently trusted as authoritative.
    pub fn held(&self) -> Option<&Arc<CurrencySnapshot>> {
        match &self.phase {
            PolicyPhase::HasSnapshot(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    /// Check if a fetch is outstanding.
    pub fn is_loading(&self) -> bool {
        matches!(self.phase, PolicyPhase::Loading(_))
    }

    /// Decide how to serve a request for `base`.
    pub fn begin(&mut self, base: &CurrencyCode) -> ResolutionStep {
        match &self.phase {
            PolicyPhase::HasSnapshot(snapshot) if snapshot.base() == base => {
                ResolutionStep::Reuse(snapshot.clone())
            }
            PolicyPhase::Loading(ticket) if ticket.base == *base => ResolutionStep::Coalesce,
            _ => {
                self.generation += 1;
                let ticket = FetchTicket {
                    base: base.clone(),
                    generation: self.generation,
                };
                self.phase = PolicyPhase::Loading(ticket.clone());
                ResolutionStep::Fetch(ticket)
            }
        }
    }

    /// Check if `ticket` is still the outstanding fetch.
    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        matches!(&self.phase, PolicyPhase::Loading(current) if current == ticket)
    }

    /// Hold `snapshot` if `ticket` is still current. Returns false for stale tickets.
    pub fn complete(&mut self, ticket: &FetchTicket, snapshot: Arc<CurrencySnapshot>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.phase = PolicyPhase::HasSnapshot(snapshot);
        true
    }

    /// Return to idle after a failed fetch. Returns false for stale tickets.
    ///
    /// Nothing is held afterwards, even when the caller falls back to a
    /// cached snapshot, so the next request fetches again.
    pub fn fail(&mut self, ticket: &FetchTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.phase = PolicyPhase::Idle;
        true
    }

    /// Drop the held snapshot, leaving an outstanding fetch to land.
    pub fn drop_held(&mut self) {
        if let PolicyPhase::HasSnapshot(_) = self.phase {
            self.phase = PolicyPhase::Idle;
        }
    }

    /// Drop the held snapshot and orphan any outstanding fetch.
    pub fn invalidate(&mut self) {
        self.generation += 1;
        self.phase = PolicyPhase::Idle;
    }
}

impl Default for RateResolutionPolicy {
    fn default() -> Self {
        Self::new()
    }
}
