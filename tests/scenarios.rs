mod support;

use rakia_media_session::sdp_types::MediaType;
use rakia_media_session::{
    Config, Event, HoldState, InboundRequestToken, MediaCallback, Session, SessionState, SignallingEvent, StreamDirection, TimerId,
};

use support::{FakeClock, FakeMediaPort, FakeSignallingPort};

fn new_session(owns_call_id: bool) -> Session<FakeSignallingPort, FakeMediaPort, FakeClock> {
    Session::new(
        "sip:peer@example.com",
        Config::default(),
        FakeSignallingPort::new(owns_call_id),
        FakeMediaPort::new(),
        FakeClock::new(),
    )
}

fn drain_events(session: &mut Session<FakeSignallingPort, FakeMediaPort, FakeClock>) -> Vec<rakia_media_session::Event> {
    let mut events = Vec::new();
    while let Some(event) = session.pop_event() {
        events.push(event);
    }
    events
}

#[test]
fn outbound_call_waits_for_local_media_before_inviting() {
    let mut session = new_session(true);

    let id = session.add_stream(MediaType::Audio).unwrap();
    assert_eq!(session.state(), SessionState::Created);

    session.handle_media_event(MediaCallback::Ready { id });
    assert_eq!(session.state(), SessionState::InviteSent);
}

#[test]
fn inbound_call_rings_then_activates_on_accept() {
    let mut session = new_session(false);

    session
        .handle_signalling_event(SignallingEvent::InviteReceived {
            token: test_token(),
        })
        .unwrap();
    assert_eq!(session.state(), SessionState::InviteReceived);

    session
        .handle_signalling_event(SignallingEvent::RemoteSdp {
            sdp: remote_offer_sdp(),
            from_response: false,
        })
        .unwrap();
    assert_eq!(session.state(), SessionState::InviteReceived);

    let id = 0;
    session.handle_media_event(MediaCallback::Ready { id });
    assert_eq!(session.state(), SessionState::InviteReceived);

    session.accept().unwrap();
    session.handle_media_event(MediaCallback::SupportedCodecs { id, count: 2 });
    assert_eq!(session.state(), SessionState::Active);
}

#[test]
fn response_received_transitions_to_active_once_media_settles() {
    let mut session = new_session(true);

    let id = session.add_stream(MediaType::Audio).unwrap();
    session.handle_media_event(MediaCallback::Ready { id });
    assert_eq!(session.state(), SessionState::InviteSent);

    session
        .handle_signalling_event(SignallingEvent::RemoteSdp {
            sdp: remote_offer_sdp(),
            from_response: true,
        })
        .unwrap();
    assert_eq!(session.state(), SessionState::ResponseReceived);

    session.handle_media_event(MediaCallback::SupportedCodecs { id, count: 2 });
    assert_eq!(session.state(), SessionState::Active);
}

#[test]
fn adding_a_stream_mid_call_sends_a_reinvite() {
    let mut session = activate(new_session(true));

    let id = session.add_stream(MediaType::Video).unwrap();
    assert_eq!(session.state(), SessionState::Active);

    session.handle_media_event(MediaCallback::Ready { id });
    assert_eq!(session.state(), SessionState::ReinviteSent);
}

#[test]
fn glare_schedules_a_retry_and_eventually_resends() {
    let mut session = activate(new_session(true));

    let id = session.add_stream(MediaType::Video).unwrap();
    session.handle_media_event(MediaCallback::Ready { id });
    assert_eq!(session.state(), SessionState::ReinviteSent);

    session
        .handle_signalling_event(SignallingEvent::FinalResponse { code: 491 })
        .unwrap();
    assert_eq!(session.state(), SessionState::ReinvitePending);

    // The session owns the Call-ID (`new_session(true)`), so the scheduled
    // back-off is the owner delay; firing that single timer should resend
    // the re-INVITE.
    session.on_timer_fired(TimerId::from_raw(1));
    assert_eq!(session.state(), SessionState::ReinviteSent);
}

#[test]
fn hold_requests_every_open_stream_and_reports_held_once_confirmed() {
    let mut session = activate(new_session(true));

    session.hold();
    assert_eq!(session.hold_state(), HoldState::PendingHold);

    session.handle_media_event(MediaCallback::HoldStateChanged { id: 0, held: true });
    assert_eq!(session.hold_state(), HoldState::Held);
}

#[test]
fn bad_reinvite_answer_rolls_back_and_rejects() {
    let mut session = activate(new_session(false));

    session
        .handle_signalling_event(SignallingEvent::ReinviteReceived { token: test_token() })
        .unwrap();
    assert_eq!(session.state(), SessionState::ReinviteReceived);

    session
        .handle_signalling_event(SignallingEvent::RemoteSdp {
            sdp: no_supported_media_sdp(),
            from_response: false,
        })
        .unwrap();

    assert_eq!(session.state(), SessionState::Active);
}

#[test]
fn terminate_from_invite_sent_cancels_and_closes_streams() {
    let mut session = new_session(true);
    let id = session.add_stream(MediaType::Audio).unwrap();
    session.handle_media_event(MediaCallback::Ready { id });
    assert_eq!(session.state(), SessionState::InviteSent);

    session.terminate();
    assert_eq!(session.state(), SessionState::Ended);
}

#[test]
fn dtmf_rejected_on_non_audio_stream() {
    let mut session = new_session(true);
    let id = session.add_stream(MediaType::Video).unwrap();

    let err = session.start_dtmf(id, 1).unwrap_err();
    support::require_invalid_argument(err);
}

#[test]
fn holding_masks_every_stream_to_send_only_immediately() {
    let mut session = activate(new_session(true));

    session.hold();
    assert_eq!(session.hold_state(), HoldState::PendingHold);

    let events = drain_events(&mut session);
    let direction_changed = events.iter().any(|e| {
        matches!(
            e,
            Event::StreamDirectionChanged { id: 0, direction, .. } if *direction == StreamDirection::SEND
        )
    });
    assert!(direction_changed, "expected stream 0 to be masked to Send immediately: {events:?}");
}

#[test]
fn repeated_hold_request_does_not_re_issue_backend_hold() {
    let mut session = activate(new_session(true));

    session.hold();
    assert_eq!(session.hold_state(), HoldState::PendingHold);
    session.hold();
    assert_eq!(session.hold_state(), HoldState::PendingHold);
}

#[test]
fn unholding_confirms_call_state_changed_and_restores_direction() {
    let mut session = activate(new_session(true));

    session.hold();
    session.handle_media_event(MediaCallback::HoldStateChanged { id: 0, held: true });
    assert_eq!(session.hold_state(), HoldState::Held);
    drain_events(&mut session);

    session.unhold();
    session.handle_media_event(MediaCallback::HoldStateChanged { id: 0, held: false });
    assert_eq!(session.hold_state(), HoldState::Unheld);

    let events = drain_events(&mut session);
    let call_state_flipped = events
        .iter()
        .any(|e| matches!(e, Event::CallStateChanged { remove_flags, .. } if !remove_flags.is_empty()));
    assert!(call_state_flipped, "expected a CallStateChanged clearing the Held flag: {events:?}");

    let direction_restored = events.iter().any(|e| {
        matches!(
            e,
            Event::StreamDirectionChanged { id: 0, direction, .. } if *direction == StreamDirection::BIDIRECTIONAL
        )
    });
    assert!(direction_restored, "expected stream 0 to be restored to bidirectional: {events:?}");
}

#[test]
fn retransmitted_identical_offer_is_a_no_op() {
    let mut session = activate(new_session(false));
    drain_events(&mut session);

    session
        .handle_signalling_event(SignallingEvent::ReinviteReceived { token: test_token() })
        .unwrap();
    session
        .handle_signalling_event(SignallingEvent::RemoteSdp {
            sdp: remote_offer_sdp(),
            from_response: false,
        })
        .unwrap();

    let events = drain_events(&mut session);
    assert!(
        !events.iter().any(|e| matches!(e, Event::StreamAdded { .. })),
        "unchanged offer should not re-pair streams: {events:?}"
    );
}

#[test]
fn reinvite_with_fewer_m_lines_closes_the_extra_stream() {
    let mut session = activate(new_session(true));

    let id = session.add_stream(MediaType::Video).unwrap();
    session.handle_media_event(MediaCallback::Ready { id });
    assert_eq!(session.state(), SessionState::ReinviteSent);

    session
        .handle_signalling_event(SignallingEvent::RemoteSdp {
            sdp: remote_offer_sdp(),
            from_response: true,
        })
        .unwrap();
    session.handle_media_event(MediaCallback::SupportedCodecs { id, count: 0 });

    let events = drain_events(&mut session);
    assert!(
        events.iter().any(|e| matches!(e, Event::StreamRemoved { id: removed } if *removed == id)),
        "expected the extra stream to be closed once the peer dropped its m-line: {events:?}"
    );
}


fn activate(mut session: Session<FakeSignallingPort, FakeMediaPort, FakeClock>) -> Session<FakeSignallingPort, FakeMediaPort, FakeClock> {
    let id = session.add_stream(MediaType::Audio).unwrap();
    session.handle_media_event(MediaCallback::Ready { id });
    assert_eq!(session.state(), SessionState::InviteSent);

    session
        .handle_signalling_event(SignallingEvent::RemoteSdp {
            sdp: remote_offer_sdp(),
            from_response: true,
        })
        .unwrap();
    session.handle_media_event(MediaCallback::SupportedCodecs { id, count: 2 });
    assert_eq!(session.state(), SessionState::Active);
    drain_events(&mut session);
    session
}

fn test_token() -> InboundRequestToken {
    InboundRequestToken::new(0)
}

fn remote_offer_sdp() -> rakia_media_session::sdp_types::SessionDescription {
    use bytesstr::BytesStr;
    use rakia_media_session::sdp_types::SessionDescription;
    SessionDescription::parse(&BytesStr::from(
        "v=0\r\no=- 1 1 IN IP4 192.168.1.10\r\ns=-\r\nc=IN IP4 192.168.1.10\r\nt=0 0\r\nm=audio 20000 RTP/AVP 0 8\r\nc=IN IP4 192.168.1.10\r\na=sendrecv\r\n",
    ))
    .unwrap()
}

fn no_supported_media_sdp() -> rakia_media_session::sdp_types::SessionDescription {
    use bytesstr::BytesStr;
    use rakia_media_session::sdp_types::SessionDescription;
    SessionDescription::parse(&BytesStr::from(
        "v=0\r\no=- 1 1 IN IP4 192.168.1.10\r\ns=-\r\nc=IN IP4 192.168.1.10\r\nt=0 0\r\nm=audio 0 RTP/AVP\r\nc=IN IP4 192.168.1.10\r\na=inactive\r\n",
    ))
    .unwrap()
}
