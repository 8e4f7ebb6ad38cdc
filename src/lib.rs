mod clock;
mod config;
mod direction;
mod error;
mod events;
mod ports;
mod sdp_view;
mod session;
mod stream;

pub use clock::{Clock, SystemClock, TimerId};
pub use config::Config;
pub use direction::{PendingSend, StreamDirection};
pub use error::{Result, SessionError};
pub use events::{CallStateFlags, Event, HoldReason, HoldState, SessionState};
pub use ports::{InboundRequestToken, MediaCallback, MediaPort, SignallingEvent, SignallingPort};
pub use sdp_view::SdpView;
pub use session::Session;
pub use stream::Stream;

pub use sdp_types;
