use crate::events::{HoldReason, HoldState};
use crate::ports::{MediaPort, SignallingPort};

use super::Session;

impl<S, M, C> Session<S, M, C>
where
    S: SignallingPort,
    M: MediaPort,
    C: crate::clock::Clock,
{
    /// Put every open stream on hold.
    pub fn hold(&mut self) {
        self.request_hold(true, HoldReason::Requested);
        self.evaluate();
    }

    /// Take every open stream off hold.
    pub fn unhold(&mut self) {
        self.request_hold(false, HoldReason::Requested);
        self.evaluate();
    }

    /// Ask every open, non-already-matching stream to flip hold state and
    /// settle the aggregate [`HoldState`] once every round-trip is known.
    /// A no-op if the session is already at (or already heading toward)
    /// the requested target.
    pub(super) fn request_hold(&mut self, hold: bool, reason: HoldReason) {
        let already_there = matches!(
            (hold, self.hold_state),
            (true, HoldState::Held)
                | (true, HoldState::PendingHold)
                | (false, HoldState::Unheld)
                | (false, HoldState::PendingUnhold)
        );
        if already_there {
            log::debug!("hold({hold}) redundant, session already {:?}", self.hold_state);
            return;
        }

        self.hold_reason = reason;

        let mut any_pending = false;
        for slot in self.streams.iter_mut() {
            let Some(stream) = slot else { continue };
            if stream.is_closed() {
                continue;
            }
            if stream.request_hold_state(&mut self.media, hold) {
                any_pending = true;
            }
        }

        let new_state = match (hold, any_pending) {
            (true, true) => HoldState::PendingHold,
            (true, false) => HoldState::Held,
            (false, true) => HoldState::PendingUnhold,
            (false, false) => HoldState::Unheld,
        };

        self.set_hold_state(new_state, reason);
        self.apply_hold_direction(hold);
    }
}
