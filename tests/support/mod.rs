use std::cell::Cell;
use std::time::{Duration, Instant};

use rakia_media_session::sdp_types::{Direction, MediaDescription, MediaType, TransportProtocol};
use rakia_media_session::{
    Clock, InboundRequestToken, MediaPort, PendingSend, SessionError, SignallingPort, StreamDirection, TimerId,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SentMessage {
    Ringing,
    Invite { is_reinvite: bool, timeout: Option<Duration> },
    Respond { code: u16, has_sdp: bool },
    Cancel,
    Bye,
    DialogDestroyed,
}

/// Records every outbound verb instead of driving a real dialog.
pub struct FakeSignallingPort {
    pub sent: Vec<SentMessage>,
    pub owns_call_id: bool,
}

impl FakeSignallingPort {
    pub fn new(owns_call_id: bool) -> Self {
        Self {
            sent: Vec::new(),
            owns_call_id,
        }
    }
}

impl SignallingPort for FakeSignallingPort {
    fn send_ringing(&mut self) {
        self.sent.push(SentMessage::Ringing);
    }

    fn send_invite(&mut self, _sdp: rakia_media_session::sdp_types::SessionDescription, is_reinvite: bool, timeout: Option<Duration>) {
        self.sent.push(SentMessage::Invite { is_reinvite, timeout });
    }

    fn send_respond(
        &mut self,
        code: u16,
        sdp: Option<rakia_media_session::sdp_types::SessionDescription>,
        _phrase: Option<&str>,
        _token: Option<InboundRequestToken>,
    ) {
        self.sent.push(SentMessage::Respond {
            code,
            has_sdp: sdp.is_some(),
        });
    }

    fn send_cancel(&mut self) {
        self.sent.push(SentMessage::Cancel);
    }

    fn send_bye(&mut self) {
        self.sent.push(SentMessage::Bye);
    }

    fn destroy_dialog(&mut self) {
        self.sent.push(SentMessage::DialogDestroyed);
    }

    fn owns_call_id(&self) -> bool {
        self.owns_call_id
    }
}

/// Media backend double: every stream is immediately assigned a fixed
/// port/codec fragment, `local_media` never changes once created.
#[derive(Default)]
pub struct FakeMediaPort {
    next_port: u16,
    pub closed: Vec<u32>,
    pub hold_requests: Vec<(u32, bool)>,
}

impl FakeMediaPort {
    pub fn new() -> Self {
        Self {
            next_port: 10000,
            closed: Vec::new(),
            hold_requests: Vec::new(),
        }
    }
}

impl MediaPort for FakeMediaPort {
    type Handle = u32;

    fn create_stream(
        &mut self,
        id: u32,
        _media_type: MediaType,
        _direction: StreamDirection,
        _pending_send: PendingSend,
    ) -> Self::Handle {
        id
    }

    fn set_playing(&mut self, _handle: Self::Handle, _playing: bool) {}
    fn set_remote_media(&mut self, _handle: Self::Handle, _media: &MediaDescription) {}
    fn set_direction(&mut self, _handle: Self::Handle, _direction: StreamDirection) {}

    fn request_hold(&mut self, handle: Self::Handle, hold: bool) {
        self.hold_requests.push((handle, hold));
    }

    fn send_dtmf(&mut self, _handle: Self::Handle, _event: u8) {}
    fn stop_dtmf(&mut self, _handle: Self::Handle) {}

    fn close(&mut self, handle: Self::Handle) {
        self.closed.push(handle);
    }

    fn local_media(&self, handle: Self::Handle) -> MediaDescription {
        let mut desc = MediaDescription::rejected(MediaType::Audio);
        desc.media.port = self.next_port + handle as u16;
        desc.media.proto = TransportProtocol::RtpAvp;
        desc.media.fmts = vec![0, 8];
        desc.direction = Direction::SendRecv;
        desc
    }
}

/// Deterministic [`Clock`]: timers never fire on their own, tests call
/// [`FakeClock::advance`]/inspect [`FakeClock::last_delay`] and fire the
/// returned `TimerId` into `Session::on_timer_fired` by hand.
pub struct FakeClock {
    next_timer: Cell<u64>,
    pub owner_delay: Duration,
    pub nonowner_delay: Duration,
    pub last_delay: Cell<Option<Duration>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            next_timer: Cell::new(0),
            owner_delay: Duration::from_millis(2100),
            nonowner_delay: Duration::from_millis(0),
            last_delay: Cell::new(None),
        }
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn set_timer(&mut self, after: Duration) -> TimerId {
        self.last_delay.set(Some(after));
        let id = self.next_timer.get() + 1;
        self.next_timer.set(id);
        TimerId::from_raw(id)
    }

    fn cancel(&mut self, _timer: TimerId) {}

    fn glare_delay(&mut self, is_owner: bool) -> Duration {
        if is_owner {
            self.owner_delay
        } else {
            self.nonowner_delay
        }
    }
}

pub fn require_invalid_argument(err: SessionError) {
    assert!(matches!(err, SessionError::InvalidArgument(_)));
}
