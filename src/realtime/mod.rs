//! Duplex streaming relay between a client WebSocket and the hosted
//! realtime speech-recognition API.
//!
//! One relay session per client connection:
//! - Session negotiation: open + configure the upstream session, confirmed
//!   by its acknowledgment before any audio flows
//! - Inbound relay: client audio frames -> upstream, order-preserving
//! - Outbound relay: upstream events -> client, filtered by mode
//! - Lifecycle coordination: first-completion-wins shutdown, both
//!   connections closed exactly once

mod coordinator;
mod error;
mod events;
mod relay;
mod session;
mod transport;
mod upstream;

pub use coordinator::{LifecycleState, RelayCoordinator, RelayOutcome};
pub use error::{RelayEnd, RelayError, RelayResult};
pub use events::{error_envelope, ClientEvent, UpstreamEvent};
pub use relay::{run_inbound, run_outbound};
pub use session::{RelayMode, SessionConfig, SessionDefaults, TurnDetection};
pub use transport::{
    split_client, split_upstream, AudioFrameSource, EventTextSink, NegotiatedUpstream,
    UpstreamConnector, UpstreamSink, UpstreamSource,
};
pub use upstream::OpenAiConnector;
