use bitflags::bitflags;

bitflags! {
    /// Achieved or requested media direction, encoded as a two-bit set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StreamDirection: u8 {
        const SEND = 0b01;
        const RECV = 0b10;
    }
}

impl StreamDirection {
    pub const NONE: Self = Self::empty();
    pub const BIDIRECTIONAL: Self = Self::SEND.union(Self::RECV);
}

impl From<sdp_types::Direction> for StreamDirection {
    fn from(d: sdp_types::Direction) -> Self {
        match d {
            sdp_types::Direction::SendRecv => StreamDirection::BIDIRECTIONAL,
            sdp_types::Direction::SendOnly => StreamDirection::SEND,
            sdp_types::Direction::RecvOnly => StreamDirection::RECV,
            sdp_types::Direction::Inactive => StreamDirection::NONE,
        }
    }
}

impl From<StreamDirection> for sdp_types::Direction {
    fn from(d: StreamDirection) -> Self {
        match (d.contains(StreamDirection::SEND), d.contains(StreamDirection::RECV)) {
            (true, true) => sdp_types::Direction::SendRecv,
            (true, false) => sdp_types::Direction::SendOnly,
            (false, true) => sdp_types::Direction::RecvOnly,
            (false, false) => sdp_types::Direction::Inactive,
        }
    }
}

bitflags! {
    /// Tracks, per side, whether a widened direction bit still awaits approval.
    ///
    /// `LOCAL` gates the `SEND` bit (we have not yet approved sending),
    /// `REMOTE` gates the `RECV` bit (we have not yet approved receiving
    /// from the peer). This mirrors the Telepathy `PENDING_LOCAL_SEND` /
    /// `PENDING_REMOTE_SEND` stream flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PendingSend: u8 {
        const LOCAL = 0b01;
        const REMOTE = 0b10;
    }
}

impl PendingSend {
    /// Convert a pending mask into the direction bits it currently gates.
    pub fn gated_bits(self) -> StreamDirection {
        let mut gated = StreamDirection::NONE;
        if self.contains(PendingSend::LOCAL) {
            gated |= StreamDirection::SEND;
        }
        if self.contains(PendingSend::REMOTE) {
            gated |= StreamDirection::RECV;
        }
        gated
    }

    /// Inverse of [`Self::gated_bits`]: which pending flags correspond to
    /// the given direction bits.
    pub fn from_gated_bits(bits: StreamDirection) -> Self {
        let mut mask = PendingSend::empty();
        if bits.contains(StreamDirection::SEND) {
            mask |= PendingSend::LOCAL;
        }
        if bits.contains(StreamDirection::RECV) {
            mask |= PendingSend::REMOTE;
        }
        mask
    }
}
