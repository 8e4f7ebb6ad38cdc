use bitflags::bitflags;
use sdp_types::MediaType;

use crate::direction::{PendingSend, StreamDirection};

/// Session-level aggregation of per-stream hold state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldState {
    Unheld,
    PendingHold,
    Held,
    PendingUnhold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    None,
    Requested,
    ResourceNotAvailable,
}

/// The nine states of the session machine (see [`crate::session::Session`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    InviteSent,
    InviteReceived,
    ResponseReceived,
    Active,
    ReinviteSent,
    ReinviteReceived,
    ReinvitePending,
    Ended,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CallStateFlags: u8 {
        /// The peer has put the call on hold.
        const HELD = 0b01;
    }
}

/// Events surfaced to the embedding channel layer. Pushed onto an
/// internal queue by [`Session`](crate::session::Session) methods and
/// drained with `Session::pop_event`.
#[derive(Debug)]
pub enum Event {
    StreamAdded {
        id: u32,
        media_type: MediaType,
    },
    StreamRemoved {
        id: u32,
    },
    StreamStateChanged {
        id: u32,
        connected: bool,
    },
    StreamDirectionChanged {
        id: u32,
        direction: StreamDirection,
        pending: PendingSend,
    },
    HoldStateChanged {
        state: HoldState,
        reason: HoldReason,
    },
    CallStateChanged {
        add_flags: CallStateFlags,
        remove_flags: CallStateFlags,
    },
    SessionStateChanged {
        old: SessionState,
        new: SessionState,
    },
    NewStreamHandler {
        id: u32,
        media_type: MediaType,
        direction: StreamDirection,
    },
}
