use sdp_types::{MediaDescription, MediaType};

use crate::direction::{PendingSend, StreamDirection};
use crate::error::{Result, SessionError};
use crate::ports::MediaPort;

/// Per-m-line state: direction, pending-send flags, hold, codec-intersect
/// flag and the local SDP fragment. `id` doubles as the stream's index in
/// `Session::streams`; slots are tombstoned, never shifted, so `id` stays
/// stable for the stream's lifetime.
pub struct Stream<H> {
    id: u32,
    media_type: MediaType,
    direction: StreamDirection,
    requested_direction: StreamDirection,
    pending_send: PendingSend,
    native_transport_rating: i32,
    codec_intersect_pending: bool,
    hold_state: bool,
    local_ready: bool,
    closed: bool,
    backend_handle: H,
}

impl<H: Copy> Stream<H> {
    /// A freshly created stream wants full duplex until something narrows
    /// it (a remote offer/answer, or a hold).
    pub(crate) fn new(id: u32, media_type: MediaType, backend_handle: H) -> Self {
        Self {
            id,
            media_type,
            direction: StreamDirection::BIDIRECTIONAL,
            requested_direction: StreamDirection::BIDIRECTIONAL,
            pending_send: PendingSend::empty(),
            native_transport_rating: 0,
            codec_intersect_pending: false,
            hold_state: false,
            local_ready: false,
            closed: false,
            backend_handle,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn direction(&self) -> StreamDirection {
        self.direction
    }

    pub fn requested_direction(&self) -> StreamDirection {
        self.requested_direction
    }

    pub fn pending_send(&self) -> PendingSend {
        self.pending_send
    }

    pub fn native_transport_rating(&self) -> i32 {
        self.native_transport_rating
    }

    pub(crate) fn set_native_transport_rating(&mut self, rating: i32) {
        self.native_transport_rating = rating;
    }

    pub fn codec_intersect_pending(&self) -> bool {
        self.codec_intersect_pending
    }

    pub(crate) fn set_codec_intersect_pending(&mut self, pending: bool) {
        self.codec_intersect_pending = pending;
    }

    pub fn hold_state(&self) -> bool {
        self.hold_state
    }

    pub(crate) fn set_hold_state(&mut self, hold: bool) {
        self.hold_state = hold;
    }

    pub fn is_local_ready(&self) -> bool {
        self.local_ready
    }

    pub(crate) fn set_local_ready(&mut self, ready: bool) {
        self.local_ready = ready;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn backend_handle(&self) -> H {
        self.backend_handle
    }

    /// Record a direction request; the achieved direction is the
    /// requested bits minus whatever the pending-send mask still gates.
    /// Returns whether the achieved direction changed.
    pub fn set_direction(&mut self, requested: StreamDirection, pending_send_mask: PendingSend) -> bool {
        let old = self.direction;
        self.requested_direction = requested;
        self.pending_send = pending_send_mask;
        self.direction = requested & !pending_send_mask.gated_bits();
        self.direction != old
    }

    /// Clear the listed pending-send bits, possibly widening the
    /// effective direction. Returns whether anything changed.
    pub fn apply_pending_send(&mut self, mask: PendingSend) -> bool {
        let old = self.direction;
        self.pending_send -= mask;
        self.direction = self.requested_direction & !self.pending_send.gated_bits();
        self.direction != old
    }

    /// Mask outgoing media to `Send` while held; restore up to the
    /// negotiated direction (still gated by any pending-send bits) once
    /// unheld. Returns whether the achieved direction changed.
    pub fn apply_hold(&mut self, hold: bool) -> bool {
        let old = self.direction;
        self.direction = if hold {
            self.direction & StreamDirection::SEND
        } else {
            self.requested_direction & !self.pending_send.gated_bits()
        };
        self.direction != old
    }

    /// Accept the peer's m-line. May narrow direction freely, or widen it
    /// only within `direction_up_mask`. Bits newly granted by this call are
    /// masked into `pending_send_mask` and recorded as still pending.
    pub fn set_remote_media(
        &mut self,
        media: &MediaDescription,
        direction_up_mask: StreamDirection,
        pending_send_mask: PendingSend,
    ) -> Result<()> {
        if media.media.fmts.is_empty() {
            return Err(SessionError::NotAvailable(format!(
                "stream {} offered no payload types",
                self.id
            )));
        }

        let peer_direction: StreamDirection = media.direction.into();
        let widened = self.direction | (peer_direction & direction_up_mask);
        let new_direction = widened & peer_direction;
        let newly_granted = new_direction & !self.direction;

        self.requested_direction = new_direction;
        self.pending_send = pending_send_mask & PendingSend::from_gated_bits(newly_granted);
        self.direction = new_direction & !self.pending_send.gated_bits();
        self.codec_intersect_pending = true;

        Ok(())
    }

    /// This stream's m-line: a zero-port stub while closed, otherwise the
    /// backend's fragment with direction overlaid.
    pub fn local_sdp<M: MediaPort<Handle = H>>(&self, media_port: &M) -> MediaDescription {
        if self.closed {
            return MediaDescription::rejected(self.media_type);
        }

        let mut desc = media_port.local_media(self.backend_handle);
        desc.direction = self.direction.into();
        desc
    }

    pub fn start_telephony_event<M: MediaPort<Handle = H>>(&self, media_port: &mut M, event: u8) -> Result<()> {
        self.require_audio()?;
        media_port.send_dtmf(self.backend_handle, event);
        Ok(())
    }

    pub fn stop_telephony_event<M: MediaPort<Handle = H>>(&self, media_port: &mut M) -> Result<()> {
        self.require_audio()?;
        media_port.stop_dtmf(self.backend_handle);
        Ok(())
    }

    fn require_audio(&self) -> Result<()> {
        if self.media_type != MediaType::Audio {
            return Err(SessionError::InvalidArgument(format!(
                "non-audio stream {} does not support telephony events",
                self.id
            )));
        }
        Ok(())
    }

    /// Ask the backend to hold/unhold. Returns whether a round-trip
    /// (awaiting `hold_state_changed`) is needed.
    pub fn request_hold_state<M: MediaPort<Handle = H>>(&mut self, media_port: &mut M, hold: bool) -> bool {
        if self.hold_state == hold {
            return false;
        }
        media_port.request_hold(self.backend_handle, hold);
        true
    }

    /// Idempotent teardown.
    pub fn close<M: MediaPort<Handle = H>>(&mut self, media_port: &mut M) {
        if self.closed {
            return;
        }
        self.closed = true;
        media_port.close(self.backend_handle);
    }
}
