//! Lifecycle coordination for one relay session.
//!
//! State machine: Idle -> Negotiating -> Streaming -> Draining -> Closed.
//! The instant either relay returns, the other is cancelled and awaited
//! (never abandoned), then both connections are closed exactly once. A
//! transport failure in either direction produces at most one error envelope
//! before the close; expected ends (disconnect, upstream end, cancellation)
//! close silently.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::{RelayError, RelayResult};
use super::events::error_envelope;
use super::relay::{run_inbound, run_outbound};
use super::session::{RelayMode, SessionConfig};
use super::transport::{AudioFrameSource, EventTextSink, UpstreamConnector, UpstreamSink};

/// Lifecycle states of one relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Negotiating,
    Streaming,
    Draining,
    Closed,
}

/// Final outcome of both relay directions, for logging and tests.
#[derive(Debug)]
pub struct RelayOutcome {
    pub inbound: RelayResult,
    pub outbound: RelayResult,
}

/// Coordinates one client connection's relay session from negotiation to
/// teardown. Terminal after `run`; a fresh connection gets a fresh instance.
pub struct RelayCoordinator {
    connection_id: Uuid,
    mode: RelayMode,
    session: SessionConfig,
    state: LifecycleState,
}

impl RelayCoordinator {
    pub fn new(mode: RelayMode, session: SessionConfig) -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            mode,
            session,
            state: LifecycleState::Idle,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    fn transition(&mut self, next: LifecycleState) {
        debug!(
            connection_id = %self.connection_id,
            from = ?self.state,
            to = ?next,
            "relay lifecycle transition"
        );
        self.state = next;
    }

    /// Run the session to completion. Returns the handshake failure if
    /// negotiation never produced a session; otherwise the per-direction
    /// outcomes. Either way, both connections are closed on return.
    pub async fn run(
        &mut self,
        frames: Box<dyn AudioFrameSource>,
        mut client_sink: Box<dyn EventTextSink>,
        connector: &dyn UpstreamConnector,
    ) -> Result<RelayOutcome, RelayError> {
        self.transition(LifecycleState::Negotiating);

        let upstream = match connector.connect(&self.session).await {
            Ok(upstream) => upstream,
            Err(e) => {
                warn!(connection_id = %self.connection_id, "negotiation failed: {e}");
                // Best effort: the client may already be gone.
                let _ = client_sink.send_text(error_envelope(&e.to_string())).await;
                let _ = client_sink.close().await;
                self.transition(LifecycleState::Closed);
                return Err(e);
            }
        };

        self.transition(LifecycleState::Streaming);
        info!(
            connection_id = %self.connection_id,
            mode = ?self.mode,
            "bidirectional streaming started"
        );

        let cancel = CancellationToken::new();
        let mut inbound = tokio::spawn(run_inbound(frames, upstream.sink, cancel.clone()));
        let mut outbound = tokio::spawn(run_outbound(
            upstream.source,
            client_sink,
            self.mode,
            upstream.pending,
            cancel.clone(),
        ));

        // First completion wins: whichever relay returns first, cancel the
        // other and wait for it to unwind deterministically.
        let (inbound_join, outbound_join) = tokio::select! {
            joined = &mut inbound => {
                self.transition(LifecycleState::Draining);
                cancel.cancel();
                (joined, (&mut outbound).await)
            }
            joined = &mut outbound => {
                self.transition(LifecycleState::Draining);
                cancel.cancel();
                ((&mut inbound).await, joined)
            }
        };

        let (upstream_sink, inbound_result) = unwind_join(inbound_join, "inbound");
        let (client_sink, outbound_result) = unwind_join(outbound_join, "outbound");

        // At most one error envelope, and only for genuine transport
        // failures; expected ends close silently.
        let failure = inbound_result
            .as_ref()
            .err()
            .or_else(|| outbound_result.as_ref().err());
        let mut client_sink = client_sink;
        if let (Some(err), Some(sink)) = (failure, client_sink.as_mut()) {
            let _ = sink.send_text(error_envelope(&err.to_string())).await;
        }

        if let Some(mut sink) = client_sink {
            let _ = sink.close().await;
        }
        if let Some(mut sink) = upstream_sink {
            let _ = sink.close().await;
        }

        self.transition(LifecycleState::Closed);
        info!(
            connection_id = %self.connection_id,
            inbound = ?inbound_result,
            outbound = ?outbound_result,
            "relay session closed"
        );

        Ok(RelayOutcome {
            inbound: inbound_result,
            outbound: outbound_result,
        })
    }
}

/// Unpack a relay task's join result. A panicked task forfeits its
/// connection half; teardown proceeds with whatever is left.
fn unwind_join<S>(
    joined: Result<(S, RelayResult), tokio::task::JoinError>,
    direction: &str,
) -> (Option<S>, RelayResult) {
    match joined {
        Ok((sink, result)) => (Some(sink), result),
        Err(e) => (
            None,
            Err(RelayError::Transport(format!(
                "{direction} relay task panicked: {e}"
            ))),
        ),
    }
}
