use std::time::Duration;

use crate::clock::Clock;
use crate::events::SessionState;
use crate::ports::{MediaPort, SignallingPort};

use super::Session;

impl<S, M, C> Session<S, M, C>
where
    S: SignallingPort,
    M: MediaPort,
    C: Clock,
{
    /// Back off before retrying a re-INVITE that collided with one from the
    /// peer (RFC 3261 §14.1). No delay if we already have an offer queued;
    /// the owner of the Call-ID waits longer than the other side so both
    /// ends don't retry into each other again.
    pub(super) fn enter_glare_pending(&mut self) {
        if let Some(timer) = self.glare_timer.take() {
            self.clock.cancel(timer);
        }

        let is_owner = self.signalling.owns_call_id();
        let delay = if self.pending_offer {
            Duration::ZERO
        } else {
            self.clock.glare_delay(is_owner)
        };

        self.glare_timer = Some(self.clock.set_timer(delay));
        self.transition(SessionState::ReinvitePending);
    }

    pub(super) fn on_glare_timer_fired(&mut self) {
        if self.state != SessionState::ReinvitePending {
            return;
        }
        self.pending_offer = true;
        self.transition(SessionState::Active);
        self.evaluate();
    }
}
