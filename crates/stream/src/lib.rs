//! Live dashboard stream.
//!
//! A [`StreamSession`] owns one client connection (behind the
//! [`LiveTransport`] port) and the consuming end of the event channel. It
//! runs a consumer loop and a liveness loop until either fails or the caller
//! cancels, then hands the transport back.

pub mod session;
pub mod transport;

pub use session::{
    EndReason, SessionConfig, SessionOutcome, SessionReport, SessionState, StreamSession,
};
pub use transport::{LiveTransport, TransportError};
