use sdp_types::{Bandwidth, MediaDescription, SessionDescription};

/// Read-only adapter over a parsed [`SessionDescription`].
pub struct SdpView<'a>(&'a SessionDescription);

impl<'a> SdpView<'a> {
    pub fn new(sdp: &'a SessionDescription) -> Self {
        Self(sdp)
    }

    pub fn media_iter(&self) -> impl Iterator<Item = &'a MediaDescription> {
        self.0.media_descriptions.iter()
    }

    /// True iff both `b=RS:0` and `b=RR:0` are present (RFC 3556), checked
    /// at session level or, per RFC 4566 `b=` scoping, overridden by a
    /// media-level pair.
    pub fn rtcp_throttled(&self) -> bool {
        if bandwidth_throttled(&self.0.bandwidth) {
            return true;
        }
        self.0
            .media_descriptions
            .iter()
            .any(|m| bandwidth_throttled(&m.bandwidth))
    }

    /// Semantic equality used to short-circuit a redundant
    /// `set_remote_media` call when the peer re-sends an unchanged offer.
    pub fn equivalent(&self, other: &SessionDescription) -> bool {
        self.0.media_descriptions.len() == other.media_descriptions.len()
            && self
                .0
                .media_descriptions
                .iter()
                .zip(&other.media_descriptions)
                .all(|(a, b)| media_equivalent(a, b))
    }
}

fn bandwidth_throttled(bandwidth: &[Bandwidth]) -> bool {
    let rs_zero = bandwidth.iter().any(|b| b.type_ == "RS" && b.bandwidth == 0);
    let rr_zero = bandwidth.iter().any(|b| b.type_ == "RR" && b.bandwidth == 0);
    rs_zero && rr_zero
}

fn media_equivalent(a: &MediaDescription, b: &MediaDescription) -> bool {
    a.media.media_type == b.media.media_type
        && a.media.port == b.media.port
        && a.direction == b.direction
        && a.mid == b.mid
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytesstr::BytesStr;

    fn sdp(src: &str) -> SessionDescription {
        SessionDescription::parse(&BytesStr::from(src.replace('\n', "\r\n"))).unwrap()
    }

    #[test]
    fn rtcp_throttled_requires_both_modifiers_at_zero() {
        let with_both = sdp(
            "v=0\no=- 1 1 IN IP4 127.0.0.1\ns=-\nc=IN IP4 127.0.0.1\nb=RS:0\nb=RR:0\nt=0 0\nm=audio 4000 RTP/AVP 0\nc=IN IP4 127.0.0.1\n",
        );
        assert!(SdpView::new(&with_both).rtcp_throttled());

        let with_one = sdp(
            "v=0\no=- 1 1 IN IP4 127.0.0.1\ns=-\nc=IN IP4 127.0.0.1\nb=RS:0\nt=0 0\nm=audio 4000 RTP/AVP 0\nc=IN IP4 127.0.0.1\n",
        );
        assert!(!SdpView::new(&with_one).rtcp_throttled());
    }

    #[test]
    fn equivalent_detects_unchanged_offer() {
        let a = sdp("v=0\no=- 1 1 IN IP4 127.0.0.1\ns=-\nc=IN IP4 127.0.0.1\nt=0 0\nm=audio 4000 RTP/AVP 0\nc=IN IP4 127.0.0.1\na=sendrecv\n");
        let b = sdp("v=0\no=- 2 2 IN IP4 127.0.0.1\ns=-\nc=IN IP4 127.0.0.1\nt=0 0\nm=audio 4000 RTP/AVP 0\nc=IN IP4 127.0.0.1\na=sendrecv\n");
        assert!(SdpView::new(&a).equivalent(&b));
    }
}
