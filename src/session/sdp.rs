use std::net::{IpAddr, Ipv4Addr};

use sdp_types::{Connection, Direction, MediaType, Origin, SessionDescription, TaggedAddress, Time};

/// Whether accepting `sdp` would leave at least one stream open: any
/// existing non-closed stream that keeps non-empty payload types (or
/// that the offer doesn't even mention), plus any new stream an
/// authoritative offer would add.
fn would_leave_any_stream_open<H: Copy>(sdp: &SessionDescription, streams: &[Option<Stream<H>>], authoritative: bool) -> bool {
    for (index, slot) in streams.iter().enumerate() {
        let Some(stream) = slot else { continue };
        if stream.is_closed() {
            continue;
        }
        match sdp.media_descriptions.get(index) {
            Some(desc) => {
                if !desc.media.fmts.is_empty() {
                    return true;
                }
            }
            None => return true,
        }
    }

    if authoritative {
        for (index, desc) in sdp.media_descriptions.iter().enumerate() {
            if index >= streams.len()
                && matches!(desc.media.media_type, MediaType::Audio | MediaType::Video)
                && !desc.media.fmts.is_empty()
            {
                return true;
            }
        }
    }

    false
}

fn plain_address(addr: &TaggedAddress) -> Option<String> {
    match addr {
        TaggedAddress::IP4(ip) => Some(ip.to_string()),
        TaggedAddress::IP6(ip) => Some(ip.to_string()),
        TaggedAddress::IP4FQDN(host) | TaggedAddress::IP6FQDN(host) => Some(host.to_string()),
    }
}

use crate::direction::{PendingSend, StreamDirection};
use crate::error::Result;
use crate::events::{Event, HoldState, SessionState};
use crate::ports::{MediaPort, SignallingPort};
use crate::sdp_view::SdpView;
use crate::stream::Stream;

use super::Session;

impl<S, M, C> Session<S, M, C>
where
    S: SignallingPort,
    M: MediaPort,
    C: crate::clock::Clock,
{
    fn build_preamble(&mut self) -> (Origin, Option<Connection>, Time) {
        self.sdp_version += 1;

        let address: IpAddr = self
            .config
            .local_ip
            .as_ref()
            .and_then(|ip| ip.parse().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        let origin = Origin {
            username: "-".into(),
            session_id: self.sdp_id.to_string().into(),
            session_version: self.sdp_version.to_string().into(),
            address: TaggedAddress::from(address),
        };

        let connection = Connection {
            address: TaggedAddress::from(address),
            ttl: None,
            num: None,
        };

        (origin, Some(connection), Time { start: 0, stop: 0 })
    }

    /// Render the local offer/answer from every non-closed stream.
    /// `None` if there is nothing to offer (no streams at all). An answer
    /// (`authoritative == false`) never carries more m-lines than the
    /// offer did, even if more local streams exist locally than the peer
    /// offered (RFC 3264 requires the answer's m-line count to match).
    pub(super) fn compose_sdp(&mut self, authoritative: bool) -> Option<SessionDescription> {
        if !self.has_any_open_stream() {
            return None;
        }

        let limit = if authoritative {
            self.streams.len()
        } else {
            self.remote_stream_count.min(self.streams.len())
        };

        let media = &self.media;
        let media_descriptions = self
            .streams
            .iter()
            .take(limit)
            .flatten()
            .map(|stream| stream.local_sdp(media))
            .collect();

        let (origin, connection, time) = self.build_preamble();

        Some(SessionDescription {
            origin,
            name: "-".into(),
            connection,
            bandwidth: Vec::new(),
            time,
            direction: Direction::SendRecv,
            group: Vec::new(),
            extmap: Vec::new(),
            extmap_allow_mixed: false,
            ice_lite: false,
            ice_options: Default::default(),
            ice_ufrag: None,
            ice_pwd: None,
            setup: None,
            fingerprint: Vec::new(),
            attributes: Vec::new(),
            media_descriptions,
        })
    }

    /// Walk the peer's m-lines, pairing by position with existing streams
    /// (creating new ones for an inbound initial offer). Returns whether at
    /// least one stream survived with supported media.
    ///
    /// `authoritative` offers (a fresh INVITE/re-INVITE) may widen
    /// direction; an SDP riding a final response to our own request may
    /// only narrow what we asked for.
    pub(super) fn absorb_remote_sdp(&mut self, sdp: SessionDescription, authoritative: bool) -> Result<bool> {
        // A retransmitted, semantically unchanged offer is a no-op: skip
        // re-pairing streams and re-triggering codec intersection.
        if let Some(current) = &self.remote_sdp {
            if SdpView::new(current).equivalent(&sdp) {
                return Ok(self.has_any_open_stream());
            }
        }

        // Reject the whole offer atomically rather than tearing down
        // streams one at a time: a 488 must leave every existing stream
        // exactly as it was, so a rollback never has to reconstruct one.
        if !would_leave_any_stream_open(&sdp, &self.streams, authoritative) {
            return Ok(false);
        }

        self.rtcp_enabled = !SdpView::new(&sdp).rtcp_throttled();

        let hold_active = matches!(self.hold_state, HoldState::Held | HoldState::PendingHold);
        let direction_up_mask = if authoritative {
            if hold_active {
                StreamDirection::SEND
            } else {
                StreamDirection::BIDIRECTIONAL
            }
        } else {
            StreamDirection::NONE
        };

        for (index, desc) in sdp.media_descriptions.iter().enumerate() {
            if index >= self.streams.len() {
                if !authoritative || !matches!(desc.media.media_type, MediaType::Audio | MediaType::Video) {
                    continue;
                }
                let handle = self.media.create_stream(
                    index as u32,
                    desc.media.media_type,
                    StreamDirection::NONE,
                    PendingSend::empty(),
                );
                self.streams.push(Some(Stream::new(index as u32, desc.media.media_type, handle)));
                self.local_non_ready += 1;
                self.emit(Event::StreamAdded {
                    id: index as u32,
                    media_type: desc.media.media_type,
                });
            }

            let connection = desc.connection.as_ref().or(sdp.connection.as_ref());
            let rating = connection
                .and_then(|c| plain_address(&c.address))
                .map(|addr| self.rate_transport(&addr, &desc.media.proto));

            let Some(stream) = self.streams[index].as_mut() else {
                continue;
            };
            if stream.is_closed() {
                continue;
            }
            let old_direction = stream.direction();

            match stream.set_remote_media(desc, direction_up_mask, PendingSend::empty()) {
                Ok(()) => {
                    if let Some(rating) = rating {
                        stream.set_native_transport_rating(rating);
                    }
                    let id = stream.id();
                    let new_direction = stream.direction();
                    let pending = stream.pending_send();
                    let handle = stream.backend_handle();
                    self.media.set_remote_media(handle, desc);
                    self.media.set_direction(handle, new_direction);
                    if new_direction != old_direction {
                        self.emit(Event::StreamDirectionChanged {
                            id,
                            direction: new_direction,
                            pending,
                        });
                    }
                }
                Err(_) => {
                    let handle = stream.backend_handle();
                    let id = stream.id();
                    self.media.close(handle);
                    self.streams[index] = None;
                    self.emit(Event::StreamRemoved { id });
                }
            }
        }

        // The peer sent fewer m-lines than we had open and we have no
        // local change of our own pending: close the extra slots rather
        // than leaving them dangling indefinitely.
        if sdp.media_descriptions.len() < self.streams.len() && !self.pending_offer {
            for id in sdp.media_descriptions.len() as u32..self.streams.len() as u32 {
                if let Some(stream) = self.streams[id as usize].as_mut() {
                    if !stream.is_closed() {
                        stream.close(&mut self.media);
                        self.emit(Event::StreamRemoved { id });
                    }
                }
            }
        }

        self.remote_stream_count = sdp.media_descriptions.len();
        self.remote_sdp = Some(sdp);
        Ok(self.has_any_open_stream())
    }

    /// Restore the pre-re-INVITE remote SDP after a rejected offer and go
    /// back to `Active`. There is a single backup slot, not a stack: a
    /// second bad re-INVITE while already rolling back is unreachable
    /// because `evaluate` will not send one until the session is settled.
    pub(super) fn rollback(&mut self) {
        if let Some(backup) = self.backup_remote_sdp.take() {
            let _ = self.absorb_remote_sdp(backup, false);
        }
        self.transition(SessionState::Active);
    }

    pub(super) fn on_glare_detected(&mut self) {
        self.backup_remote_sdp = self.remote_sdp.clone();
        self.enter_glare_pending();
    }

    pub(super) fn on_stream_hold_state_changed(&mut self, id: u32, held: bool) {
        if let Ok(stream) = self.stream_mut(id) {
            stream.set_hold_state(held);
        }
        self.recompute_hold_state();
    }

    fn recompute_hold_state(&mut self) {
        let any_held = self.open_streams().any(Stream::hold_state);
        let all_held = self.has_any_open_stream() && self.open_streams().all(Stream::hold_state);

        let new_state = match (self.hold_state, all_held, any_held) {
            (HoldState::PendingHold, true, _) => HoldState::Held,
            (HoldState::PendingUnhold, false, _) => HoldState::Unheld,
            (_, true, _) => HoldState::Held,
            (_, false, true) => HoldState::PendingHold,
            (_, false, false) => HoldState::Unheld,
        };

        let reason = self.hold_reason;
        self.set_hold_state(new_state, reason);
        self.apply_hold_direction(matches!(new_state, HoldState::Held | HoldState::PendingHold));
    }

    /// Mask every open stream's direction to `Send` while held, restore it
    /// once unheld. Called both eagerly (the moment a hold is requested)
    /// and again once the backend confirms, so it's always idempotent.
    pub(super) fn apply_hold_direction(&mut self, hold: bool) {
        for id in 0..self.streams.len() as u32 {
            let Some(stream) = self.streams[id as usize].as_mut() else {
                continue;
            };
            if stream.is_closed() {
                continue;
            }
            if stream.apply_hold(hold) {
                let direction = stream.direction();
                let pending = stream.pending_send();
                let handle = stream.backend_handle();
                self.media.set_direction(handle, direction);
                self.emit(Event::StreamDirectionChanged { id, direction, pending });
            }
        }
    }
}
