mod glare;
mod hold;
mod sdp;

use std::collections::VecDeque;

use sdp_types::{MediaType, SessionDescription, TransportProtocol};

use crate::clock::{Clock, TimerId};
use crate::config::Config;
use crate::direction::{PendingSend, StreamDirection};
use crate::error::{Result, SessionError};
use crate::events::{CallStateFlags, Event, HoldReason, HoldState, SessionState};
use crate::ports::{InboundRequestToken, MediaCallback, MediaPort, SignallingEvent, SignallingPort};
use crate::stream::Stream;

/// Owns the streams and drives the nine-state session machine: glare
/// timer, hold aggregation, offer/answer composition.
///
/// The only place that emits protocol verbs is [`Session::evaluate`],
/// invoked at the end of every method that could have changed what the
/// session is allowed to do next. Calling it with nothing new to act on
/// is a no-op.
pub struct Session<S, M, C>
where
    M: MediaPort,
{
    peer: String,
    state: SessionState,
    remote_initiated: bool,
    accepted: bool,
    rtcp_enabled: bool,
    hold_state: HoldState,
    hold_reason: HoldReason,
    streams: Vec<Option<Stream<M::Handle>>>,
    local_non_ready: u32,
    /// Set while `InviteReceived`/`ReinviteReceived` is waiting for the
    /// offer's SDP to actually arrive, so `evaluate` does not answer an
    /// offer it hasn't seen yet.
    awaiting_remote_offer: bool,
    pending_offer: bool,
    /// Number of m-lines in the most recently absorbed remote SDP. An
    /// answer never carries more m-lines than this, even if more local
    /// streams exist.
    remote_stream_count: usize,
    remote_sdp: Option<SessionDescription>,
    backup_remote_sdp: Option<SessionDescription>,
    saved_event: Option<InboundRequestToken>,
    glare_timer: Option<TimerId>,
    sdp_id: u64,
    sdp_version: u64,
    config: Config,
    events: VecDeque<Event>,
    signalling: S,
    media: M,
    clock: C,
}

impl<S, M, C> Session<S, M, C>
where
    S: SignallingPort,
    M: MediaPort,
    C: Clock,
{
    pub fn new(peer: impl Into<String>, config: Config, signalling: S, media: M, clock: C) -> Self {
        let rtcp_enabled = config.rtcp_enabled_default;
        Self {
            peer: peer.into(),
            state: SessionState::Created,
            remote_initiated: false,
            accepted: false,
            rtcp_enabled,
            hold_state: HoldState::Unheld,
            hold_reason: HoldReason::None,
            streams: Vec::new(),
            local_non_ready: 0,
            awaiting_remote_offer: false,
            pending_offer: false,
            remote_stream_count: 0,
            remote_sdp: None,
            backup_remote_sdp: None,
            saved_event: None,
            glare_timer: None,
            sdp_id: rand::random(),
            sdp_version: 0,
            config,
            events: VecDeque::new(),
            signalling,
            media,
            clock,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn hold_state(&self) -> HoldState {
        self.hold_state
    }

    pub fn rtcp_enabled(&self) -> bool {
        self.rtcp_enabled
    }

    pub fn pop_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    fn emit(&mut self, event: Event) {
        self.events.push_back(event);
    }

    fn transition(&mut self, to: SessionState) {
        if self.state == to {
            return;
        }
        log::debug!("session with {} transitioning {:?} -> {:?}", self.peer, self.state, to);
        let old = self.state;
        self.state = to;
        self.emit(Event::SessionStateChanged { old, new: to });

        if to == SessionState::Active && old != SessionState::Active {
            let ids: Vec<u32> = self.open_streams().map(Stream::id).collect();
            for id in ids {
                self.emit(Event::StreamStateChanged { id, connected: true });
            }
        }
    }

    /// Move the session-level hold aggregate to `new_state`, emitting
    /// `HoldStateChanged` and, when the settled `Held`/not-`Held` bit
    /// actually flips, `CallStateChanged` too. A no-op if already there.
    pub(super) fn set_hold_state(&mut self, new_state: HoldState, reason: HoldReason) {
        if new_state == self.hold_state {
            return;
        }
        let was_held = self.hold_state == HoldState::Held;
        let is_held = new_state == HoldState::Held;
        self.hold_state = new_state;
        self.emit(Event::HoldStateChanged { state: new_state, reason });

        if is_held != was_held {
            let (add_flags, remove_flags) = if is_held {
                (CallStateFlags::HELD, CallStateFlags::empty())
            } else {
                (CallStateFlags::empty(), CallStateFlags::HELD)
            };
            self.emit(Event::CallStateChanged { add_flags, remove_flags });
        }
    }

    fn stream_mut(&mut self, id: u32) -> Result<&mut Stream<M::Handle>> {
        self.streams
            .get_mut(id as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| SessionError::InvalidArgument(format!("no such stream {id}")))
    }

    /// Split borrow so a stream can be mutated alongside the media backend
    /// without re-entering through `&mut self`.
    fn stream_and_media_mut(&mut self, id: u32) -> Result<(&mut Stream<M::Handle>, &mut M)> {
        let stream = self
            .streams
            .get_mut(id as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| SessionError::InvalidArgument(format!("no such stream {id}")))?;
        Ok((stream, &mut self.media))
    }

    fn any_codec_intersect_pending(&self) -> bool {
        self.streams
            .iter()
            .flatten()
            .any(|s| !s.is_closed() && s.codec_intersect_pending())
    }

    fn open_streams(&self) -> impl Iterator<Item = &Stream<M::Handle>> {
        self.streams.iter().flatten().filter(|s| !s.is_closed())
    }

    fn has_any_open_stream(&self) -> bool {
        self.open_streams().next().is_some()
    }

    /// Non-UDP transports are penalised, matching native IP is preferred.
    /// IPv4 literal comparison only; see design notes for the IPv6 gap.
    pub fn rate_transport(&self, addr: &str, proto: &TransportProtocol) -> i32 {
        if *proto != TransportProtocol::RtpAvp && *proto != TransportProtocol::RtpAvpf {
            return -1;
        }
        match &self.config.local_ip {
            Some(local_ip) if local_ip == addr => 1,
            _ => 0,
        }
    }

    /// Add a locally-originated stream. Stays not-ready until the media
    /// backend reports `Ready`; `evaluate` sends the (re-)INVITE once
    /// every stream is ready.
    pub fn add_stream(&mut self, media_type: MediaType) -> Result<u32> {
        if !matches!(media_type, MediaType::Audio | MediaType::Video) {
            return Err(SessionError::InvalidArgument(format!(
                "unsupported media type {media_type:?}"
            )));
        }

        let id = self.streams.len() as u32;
        let handle = self
            .media
            .create_stream(id, media_type, StreamDirection::BIDIRECTIONAL, PendingSend::empty());
        self.streams.push(Some(Stream::new(id, media_type, handle)));
        self.local_non_ready += 1;

        if matches!(self.state, SessionState::Active | SessionState::ReinvitePending) {
            self.pending_offer = true;
        }

        self.emit(Event::StreamAdded { id, media_type });
        self.evaluate();
        Ok(id)
    }

    pub fn remove_stream(&mut self, id: u32) -> Result<()> {
        let was_ready = {
            let (stream, media) = self.stream_and_media_mut(id)?;
            let ready = stream.is_local_ready();
            stream.close(media);
            ready
        };
        if !was_ready {
            self.local_non_ready = self.local_non_ready.saturating_sub(1);
        }
        if matches!(self.state, SessionState::Active | SessionState::ReinvitePending) {
            self.pending_offer = true;
        }
        self.emit(Event::StreamRemoved { id });
        self.evaluate();
        Ok(())
    }

    /// Local user accepts an inbound session. Streams the media backend
    /// already reported ready for get their handler event now; the rest
    /// get it when `Ready` arrives.
    pub fn accept(&mut self) -> Result<()> {
        self.accepted = true;

        let already_ready: Vec<(u32, MediaType, StreamDirection)> = self
            .streams
            .iter()
            .flatten()
            .filter(|s| s.is_local_ready())
            .map(|s| (s.id(), s.media_type(), s.direction()))
            .collect();
        for (id, media_type, direction) in already_ready {
            self.emit(Event::NewStreamHandler { id, media_type, direction });
        }

        self.evaluate();
        Ok(())
    }

    pub fn start_dtmf(&mut self, id: u32, event: u8) -> Result<()> {
        let (stream, media) = self.stream_and_media_mut(id)?;
        stream.start_telephony_event(media, event)
    }

    pub fn stop_dtmf(&mut self, id: u32) -> Result<()> {
        let (stream, media) = self.stream_and_media_mut(id)?;
        stream.stop_telephony_event(media)
    }

    /// Terminate from any state; always allowed.
    pub fn terminate(&mut self) {
        if self.state == SessionState::Ended {
            return;
        }

        match self.state {
            SessionState::InviteSent | SessionState::ReinvitePending | SessionState::ReinviteSent => {
                self.signalling.send_cancel();
            }
            SessionState::InviteReceived => {
                self.signalling.send_respond(480, None, Some("Terminated"), self.saved_event.take());
            }
            _ => {
                self.signalling.send_bye();
            }
        }

        self.close_all_streams();
        if let Some(timer) = self.glare_timer.take() {
            self.clock.cancel(timer);
        }
        self.saved_event = None;
        self.signalling.destroy_dialog();
        self.transition(SessionState::Ended);
    }

    fn close_all_streams(&mut self) {
        for id in 0..self.streams.len() as u32 {
            if let Some(stream) = self.streams[id as usize].as_mut() {
                if !stream.is_closed() {
                    stream.close(&mut self.media);
                    self.emit(Event::StreamRemoved { id });
                }
            }
        }
    }

    pub fn on_timer_fired(&mut self, timer: TimerId) {
        if self.glare_timer != Some(timer) {
            return;
        }
        self.glare_timer = None;
        self.on_glare_timer_fired();
    }

    pub fn handle_signalling_event(&mut self, event: SignallingEvent) -> Result<()> {
        if self.state == SessionState::Ended {
            return Ok(());
        }

        match event {
            SignallingEvent::InviteReceived { token } => {
                self.remote_initiated = true;
                self.saved_event = Some(token);
                self.awaiting_remote_offer = true;
                self.signalling.send_ringing();
                self.transition(SessionState::InviteReceived);
            }
            SignallingEvent::ReinviteReceived { token } => {
                if let Some(timer) = self.glare_timer.take() {
                    self.clock.cancel(timer);
                }
                self.backup_remote_sdp = self.remote_sdp.clone();
                self.saved_event = Some(token);
                self.awaiting_remote_offer = true;
                self.transition(SessionState::ReinviteReceived);
            }
            SignallingEvent::RemoteSdp { sdp, from_response } => {
                let authoritative = !from_response;
                if authoritative {
                    self.awaiting_remote_offer = false;
                }
                match self.absorb_remote_sdp(sdp, authoritative) {
                    Ok(true) => {
                        if from_response && self.state == SessionState::InviteSent {
                            self.transition(SessionState::ResponseReceived);
                        }
                    }
                    Ok(false) => {
                        self.on_no_supported_media();
                    }
                    Err(err) => return Err(err),
                }
            }
            SignallingEvent::FinalResponse { code } => {
                self.on_final_response(code);
            }
            SignallingEvent::Bye | SignallingEvent::Cancelled => {
                self.terminate();
            }
            SignallingEvent::GlareDetected => {
                self.on_glare_detected();
            }
            SignallingEvent::SavedEventExpired => {
                self.saved_event = None;
            }
        }

        self.evaluate();
        Ok(())
    }

    fn on_final_response(&mut self, code: u16) {
        match self.state {
            SessionState::ReinviteSent if code == 491 => self.on_glare_detected(),
            SessionState::InviteSent if !(200..300).contains(&code) => self.terminate(),
            SessionState::ReinviteSent if !(200..300).contains(&code) && code != 491 => {
                log::warn!("re-INVITE rejected with {code}, staying Active");
                self.transition(SessionState::Active);
            }
            _ => {}
        }
    }

    fn on_no_supported_media(&mut self) {
        match self.state {
            SessionState::ReinviteReceived => self.rollback(),
            _ => self.terminate(),
        }
    }

    pub fn handle_media_event(&mut self, event: MediaCallback) {
        if self.state == SessionState::Ended {
            return;
        }

        match event {
            MediaCallback::Ready { id } => {
                if let Ok(stream) = self.stream_mut(id) {
                    if !stream.is_local_ready() {
                        stream.set_local_ready(true);
                        self.local_non_ready = self.local_non_ready.saturating_sub(1);
                    }
                }
                self.emit(Event::NewStreamHandler {
                    id,
                    media_type: self.streams[id as usize].as_ref().map(Stream::media_type).unwrap_or(MediaType::Audio),
                    direction: self.streams[id as usize].as_ref().map(Stream::direction).unwrap_or(StreamDirection::NONE),
                });
            }
            MediaCallback::SupportedCodecs { id, count } => {
                if let Ok(stream) = self.stream_mut(id) {
                    stream.set_codec_intersect_pending(false);
                }
                if count == 0 {
                    match self.state {
                        SessionState::ReinviteReceived => {
                            self.rollback();
                            return;
                        }
                        _ => {
                            if let Ok((stream, media)) = self.stream_and_media_mut(id) {
                                stream.close(media);
                            }
                            self.emit(Event::StreamRemoved { id });
                        }
                    }
                }
            }
            MediaCallback::HoldStateChanged { id, held } => {
                self.on_stream_hold_state_changed(id, held);
            }
            MediaCallback::UnholdFailure { id: _ } => {
                self.request_hold(true, HoldReason::ResourceNotAvailable);
            }
            MediaCallback::LocalMediaUpdated { id } => {
                let has_stream = self.streams.get(id as usize).map(|s| s.is_some()).unwrap_or(false);
                if has_stream && matches!(self.state, SessionState::Active | SessionState::ReinvitePending) {
                    self.pending_offer = true;
                }
            }
            MediaCallback::Closed { id } => {
                self.emit(Event::StreamRemoved { id });
            }
        }

        self.evaluate();
    }

    /// The central request/response step: the only place that emits
    /// outbound protocol verbs. Invoked after every external input;
    /// idempotent when nothing new has changed.
    fn evaluate(&mut self) {
        let local_ready = self.local_non_ready == 0;
        let codec_pending = self.any_codec_intersect_pending();

        match self.state {
            SessionState::Created => {
                if local_ready && self.has_any_open_stream() {
                    self.send_initial_invite();
                }
            }
            SessionState::InviteReceived => {
                if self.accepted && !self.awaiting_remote_offer && local_ready && !codec_pending {
                    self.send_answer_and_activate();
                }
            }
            SessionState::ResponseReceived => {
                if local_ready && !codec_pending {
                    self.transition(SessionState::Active);
                }
            }
            SessionState::Active => {
                if self.pending_offer && local_ready && !codec_pending {
                    self.send_reinvite();
                }
            }
            SessionState::ReinviteReceived => {
                if !self.awaiting_remote_offer && local_ready && !codec_pending {
                    self.send_reinvite_answer_and_activate();
                }
            }
            SessionState::InviteSent | SessionState::ReinviteSent | SessionState::ReinvitePending | SessionState::Ended => {}
        }
    }

    fn send_initial_invite(&mut self) {
        let Some(sdp) = self.compose_sdp(true) else {
            return;
        };
        for stream in self.streams.iter_mut().flatten() {
            self.media.set_playing(stream.backend_handle(), true);
        }
        self.signalling.send_invite(sdp, false, None);
        self.transition(SessionState::InviteSent);
    }

    fn send_answer_and_activate(&mut self) {
        let Some(sdp) = self.compose_sdp(false) else {
            self.signalling.send_respond(488, None, None, self.saved_event.take());
            self.terminate();
            return;
        };
        self.signalling.send_respond(200, Some(sdp), None, self.saved_event.take());
        self.transition(SessionState::Active);
    }

    fn send_reinvite(&mut self) {
        let Some(sdp) = self.compose_sdp(true) else {
            return;
        };
        self.pending_offer = false;
        self.signalling
            .send_invite(sdp, true, Some(self.config.reinvite_timeout));
        self.transition(SessionState::ReinviteSent);
    }

    fn send_reinvite_answer_and_activate(&mut self) {
        let Some(sdp) = self.compose_sdp(false) else {
            self.signalling.send_respond(488, None, None, self.saved_event.take());
            self.rollback();
            return;
        };
        self.signalling.send_respond(200, Some(sdp), None, self.saved_event.take());
        self.backup_remote_sdp = None;
        self.transition(SessionState::Active);
    }
}
