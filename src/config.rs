use std::time::Duration;

/// Construction-time configuration for a [`Session`](crate::session::Session).
///
/// Immutable for the session's lifetime; there is no runtime
/// reconfiguration layer, the coordinator is embedded by a host process
/// that already owns its own configuration story.
#[derive(Debug, Clone)]
pub struct Config {
    /// Preferred local address used by `rate_transport` to favour the
    /// native RTP transport over a relayed one.
    pub local_ip: Option<String>,

    /// Default for `rtcp_enabled` when a remote SDP omits `b=RS`/`b=RR`.
    pub rtcp_enabled_default: bool,

    /// re-INVITE transaction timeout (RFC 3261 §13.3.1.1 default: 180s).
    pub reinvite_timeout: Duration,

    /// Glare back-off range used when this side owns the Call-ID.
    pub glare_interval_owner: (Duration, Duration),

    /// Glare back-off range used when the peer owns the Call-ID.
    pub glare_interval_nonowner: (Duration, Duration),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            local_ip: None,
            rtcp_enabled_default: true,
            reinvite_timeout: Duration::from_secs(180),
            glare_interval_owner: (Duration::from_millis(2100), Duration::from_millis(4000)),
            glare_interval_nonowner: (Duration::from_millis(0), Duration::from_millis(2000)),
        }
    }
}
