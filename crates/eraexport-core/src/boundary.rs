//! Boundary tracker — classifies epoch-progress snapshots as session or era
//! boundaries approaching.
//!
//! Chain progress telemetry is not reliable near the end of an epoch and can
//! jump straight into the next one without ever reporting `length - 1`, so a
//! boundary is reported while the chain is *within* `threshold` blocks of the
//! end rather than exactly at it. The transition into a new epoch is state
//! bookkeeping only and never triggers an export itself.
//!
//! The transition logic lives in the free functions [`observe`] and
//! [`classify`], which take the [`BoundaryState`] by reference so they can be
//! exercised without a chain connection.

use serde::{Deserialize, Serialize};

use crate::types::{BlockNumber, EpochProgress, EraIndex, SessionIndex};

/// Last session and era confirmed by the tracker. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryState {
    pub last_seen_session: SessionIndex,
    pub last_seen_era: EraIndex,
}

impl BoundaryState {
    /// Initialise from the chain's current progress.
    pub fn from_progress(progress: &EpochProgress) -> Self {
        Self {
            last_seen_session: progress.current_session,
            last_seen_era: progress.active_era,
        }
    }
}

/// Which export, if any, a snapshot calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Boundary {
    None,
    SessionEnd,
    EraEnd,
}

/// A confirmed move into a new epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The active era advanced; `session` is set when the session advanced with it.
    EraAdvanced {
        era: EraIndex,
        session: Option<SessionIndex>,
    },
    SessionAdvanced { session: SessionIndex },
}

/// Outcome of feeding one snapshot to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub boundary: Boundary,
    pub transition: Option<Transition>,
}

impl Observation {
    fn boundary(boundary: Boundary) -> Self {
        Self {
            boundary,
            transition: None,
        }
    }

    fn transition(transition: Transition) -> Self {
        Self {
            boundary: Boundary::None,
            transition: Some(transition),
        }
    }
}

/// Feed one snapshot through the state machine.
///
/// Order matters: an era advance is checked first, then the era-end window,
/// then a session advance, then the session-end window. An era end therefore
/// suppresses the session end it coincides with.
pub fn observe(
    state: &mut BoundaryState,
    progress: &EpochProgress,
    threshold: BlockNumber,
) -> Observation {
    if progress.active_era > state.last_seen_era {
        state.last_seen_era = progress.active_era;
        let session = advance_session(state, progress);
        return Observation::transition(Transition::EraAdvanced {
            era: progress.active_era,
            session,
        });
    }

    if progress.era_blocks_remaining() < threshold {
        return Observation::boundary(Boundary::EraEnd);
    }

    if let Some(session) = advance_session(state, progress) {
        return Observation::transition(Transition::SessionAdvanced { session });
    }

    if progress.session_blocks_remaining() < threshold {
        return Observation::boundary(Boundary::SessionEnd);
    }

    Observation::boundary(Boundary::None)
}

/// Classify a snapshot, updating `state` on transitions.
pub fn classify(
    state: &mut BoundaryState,
    progress: &EpochProgress,
    threshold: BlockNumber,
) -> Boundary {
    observe(state, progress, threshold).boundary
}

fn advance_session(state: &mut BoundaryState, progress: &EpochProgress) -> Option<SessionIndex> {
    if progress.current_session > state.last_seen_session {
        state.last_seen_session = progress.current_session;
        Some(progress.current_session)
    } else {
        None
    }
}

// ─── BoundaryTracker ──────────────────────────────────────────────────────────

/// Owns a [`BoundaryState`] together with the configured threshold.
#[derive(Debug, Clone)]
pub struct BoundaryTracker {
    state: BoundaryState,
    threshold: BlockNumber,
    session_only: bool,
}

impl BoundaryTracker {
    pub fn new(initial: BoundaryState, threshold: BlockNumber) -> Self {
        Self {
            state: initial,
            threshold,
            session_only: false,
        }
    }

    /// Report era ends as session ends (only session exports are produced).
    pub fn session_only(mut self, session_only: bool) -> Self {
        self.session_only = session_only;
        self
    }

    pub fn state(&self) -> BoundaryState {
        self.state
    }

    pub fn threshold(&self) -> BlockNumber {
        self.threshold
    }

    /// Feed a snapshot and log what was seen.
    pub fn observe(&mut self, progress: &EpochProgress) -> Observation {
        if !progress.is_well_formed() {
            tracing::warn!(?progress, "Epoch progress exceeds epoch length");
        }

        let mut obs = observe(&mut self.state, progress, self.threshold);
        if self.session_only && obs.boundary == Boundary::EraEnd {
            obs.boundary = Boundary::SessionEnd;
        }

        match obs.transition {
            Some(Transition::EraAdvanced { era, session }) => {
                tracing::info!(era, ?session, "Era advanced");
            }
            Some(Transition::SessionAdvanced { session }) => {
                tracing::info!(session, "Session advanced");
            }
            None => {}
        }
        if obs.boundary != Boundary::None {
            tracing::info!(
                boundary = ?obs.boundary,
                session = progress.current_session,
                era = progress.active_era,
                session_remaining = progress.session_blocks_remaining(),
                era_remaining = progress.era_blocks_remaining(),
                "Boundary detected"
            );
        }
        obs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: BlockNumber = 20;

    fn progress(session: SessionIndex, era: EraIndex, s_prog: u64, e_prog: u64) -> EpochProgress {
        EpochProgress {
            current_session: session,
            current_era: era,
            active_era: era,
            session_length: 600,
            session_progress: s_prog,
            era_length: 3600,
            era_progress: e_prog,
        }
    }

    fn state(session: SessionIndex, era: EraIndex) -> BoundaryState {
        BoundaryState {
            last_seen_session: session,
            last_seen_era: era,
        }
    }

    #[test]
    fn mid_epoch_is_none() {
        let mut st = state(10, 2);
        for (s, e) in [(0, 0), (100, 1000), (580, 1780), (580, 3580)] {
            assert_eq!(classify(&mut st, &progress(10, 2, s, e), THRESHOLD), Boundary::None);
        }
        assert_eq!(st, state(10, 2));
    }

    #[test]
    fn session_end_within_threshold() {
        let mut st = state(10, 2);
        let p = progress(10, 2, 585, 1785);
        assert_eq!(classify(&mut st, &p, THRESHOLD), Boundary::SessionEnd);
    }

    #[test]
    fn era_end_takes_precedence() {
        let mut st = state(15, 2);
        // last session of the era: both windows are open
        let p = progress(15, 2, 590, 3590);
        assert_eq!(classify(&mut st, &p, THRESHOLD), Boundary::EraEnd);
        // era window open, session window closed
        let p = progress(15, 2, 100, 3581);
        assert_eq!(classify(&mut st, &p, THRESHOLD), Boundary::EraEnd);
    }

    #[test]
    fn threshold_is_exclusive() {
        let mut st = state(10, 2);
        let p = progress(10, 2, 580, 1780);
        assert_eq!(classify(&mut st, &p, THRESHOLD), Boundary::None);
        let p = progress(10, 2, 581, 1781);
        assert_eq!(classify(&mut st, &p, THRESHOLD), Boundary::SessionEnd);
    }

    #[test]
    fn session_advance_is_not_a_trigger() {
        let mut st = state(10, 2);
        // telemetry jumped into the next session and is already near its end
        let p = progress(11, 2, 590, 2390);
        let obs = observe(&mut st, &p, THRESHOLD);
        assert_eq!(obs.boundary, Boundary::None);
        assert_eq!(obs.transition, Some(Transition::SessionAdvanced { session: 11 }));
        assert_eq!(st.last_seen_session, 11);
        // the next head in the same window triggers
        assert_eq!(classify(&mut st, &p, THRESHOLD), Boundary::SessionEnd);
    }

    #[test]
    fn era_advance_cascades_into_session() {
        let mut st = state(15, 2);
        let p = progress(16, 3, 1, 1);
        let obs = observe(&mut st, &p, THRESHOLD);
        assert_eq!(obs.boundary, Boundary::None);
        assert_eq!(
            obs.transition,
            Some(Transition::EraAdvanced { era: 3, session: Some(16) })
        );
        assert_eq!(st, state(16, 3));
    }

    #[test]
    fn state_never_moves_backwards() {
        let mut st = state(10, 2);
        let seq = [
            progress(11, 2, 5, 605),
            progress(9, 1, 5, 5), // stale snapshot from a lagging node
            progress(12, 3, 5, 5),
            progress(12, 2, 590, 3590),
        ];
        let mut prev = st;
        for p in &seq {
            observe(&mut st, p, THRESHOLD);
            assert!(st.last_seen_era >= prev.last_seen_era);
            assert!(st.last_seen_session >= prev.last_seen_session);
            prev = st;
        }
        assert_eq!(st, state(12, 3));
    }

    #[test]
    fn tracker_session_only_downgrades_era_end() {
        let mut tracker = BoundaryTracker::new(state(15, 2), THRESHOLD).session_only(true);
        assert_eq!(tracker.threshold(), THRESHOLD);
        let obs = tracker.observe(&progress(15, 2, 590, 3590));
        assert_eq!(obs.boundary, Boundary::SessionEnd);

        let mut tracker = BoundaryTracker::new(state(15, 2), THRESHOLD);
        assert_eq!(tracker.observe(&progress(15, 2, 590, 3590)).boundary, Boundary::EraEnd);
    }
}
