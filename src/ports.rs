use std::time::Duration;

use sdp_types::{MediaDescription, MediaType, SessionDescription};

use crate::direction::{PendingSend, StreamDirection};

/// Move-only handle for a request the peer expects exactly one response
/// to. Carrying it into [`SignallingPort::send_respond`] consumes it,
/// preventing a double reply.
#[derive(Debug)]
pub struct InboundRequestToken(#[allow(dead_code)] pub(crate) u64);

impl InboundRequestToken {
    /// Mint a token for an inbound request. Called by the signalling
    /// stack when it hands a request to the session as a
    /// [`SignallingEvent`]; the identifier is the stack's own, Session
    /// never inspects it.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Inbound events delivered by the SIP signalling stack.
pub enum SignallingEvent {
    InviteReceived {
        token: InboundRequestToken,
    },
    ReinviteReceived {
        token: InboundRequestToken,
    },
    RemoteSdp {
        sdp: SessionDescription,
        from_response: bool,
    },
    FinalResponse {
        code: u16,
    },
    Bye,
    Cancelled,
    GlareDetected,
    SavedEventExpired,
}

/// Outbound verbs the session issues against the SIP signalling stack.
///
/// The stack itself (transactions, retransmission, dialog matching) is
/// external; this trait is just the set of primitives Session needs.
pub trait SignallingPort {
    fn send_ringing(&mut self);

    /// `timeout` must be set to 180s for a re-INVITE (RFC 3261 §13.3.1.1).
    fn send_invite(&mut self, sdp: SessionDescription, is_reinvite: bool, timeout: Option<Duration>);

    fn send_respond(
        &mut self,
        code: u16,
        sdp: Option<SessionDescription>,
        phrase: Option<&str>,
        token: Option<InboundRequestToken>,
    );

    fn send_cancel(&mut self);
    fn send_bye(&mut self);
    fn destroy_dialog(&mut self);

    /// True if this side is considered the Call-ID owner for the purpose
    /// of glare resolution (RFC 3261 §14.1: the side that sent the
    /// original INVITE).
    fn owns_call_id(&self) -> bool;
}

/// Backend → Session callbacks reporting asynchronous media backend state.
pub enum MediaCallback {
    Ready { id: u32 },
    SupportedCodecs { id: u32, count: u32 },
    HoldStateChanged { id: u32, held: bool },
    UnholdFailure { id: u32 },
    LocalMediaUpdated { id: u32 },
    Closed { id: u32 },
}

/// Abstract local media backend ("stream engine").
///
/// Session calls these to drive the backend; the backend reports back
/// asynchronously through [`MediaCallback`] fed into
/// [`Session::handle_media_event`](crate::session::Session::handle_media_event).
pub trait MediaPort {
    /// Opaque reference to the backend's own bookkeeping for one stream.
    type Handle: Copy + std::fmt::Debug;

    fn create_stream(
        &mut self,
        id: u32,
        media_type: MediaType,
        direction: StreamDirection,
        pending_send: PendingSend,
    ) -> Self::Handle;

    fn set_playing(&mut self, handle: Self::Handle, playing: bool);
    fn set_remote_media(&mut self, handle: Self::Handle, media: &MediaDescription);
    fn set_direction(&mut self, handle: Self::Handle, direction: StreamDirection);
    fn request_hold(&mut self, handle: Self::Handle, hold: bool);
    fn send_dtmf(&mut self, handle: Self::Handle, event: u8);
    fn stop_dtmf(&mut self, handle: Self::Handle);
    fn close(&mut self, handle: Self::Handle);

    /// The stream's current local m-line content (port, codecs). Only
    /// queried once the stream has reported `Ready`; codec negotiation
    /// itself lives entirely in the backend.
    fn local_media(&self, handle: Self::Handle) -> MediaDescription;
}
