//! Stream supervisor
//!
//! Owns the single upstream stream. It sleeps in `Idle` until the broadcaster
//! reports the first viewer, keeps a stream open (reconnecting on end or
//! error) while viewers remain, and closes it as soon as the last viewer
//! leaves. The reconnect loop is an explicit state machine driven by one task.

use std::sync::Arc;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::WallError;
use crate::registry::{Broadcaster, CommandReceiver, StreamCommand};

use super::backoff::ReconnectPolicy;
use super::connector::{FilterParams, StreamConnector, UpstreamEvent, UpstreamStream};
use super::state::SupervisorState;

/// Why a supervising cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    /// Last viewer left; go back to idle
    Stopped,
    /// Broadcaster is gone; exit the task
    Shutdown,
}

/// How one open stream finished
enum StreamOutcome {
    Stopped(Flow),
    Ended,
    Failed(WallError),
}

/// Supervises the upstream stream on behalf of the broadcaster
pub struct StreamSupervisor<C: StreamConnector> {
    connector: C,
    filter: FilterParams,
    policy: ReconnectPolicy,
    broadcaster: Arc<Broadcaster>,
    commands: CommandReceiver,
    state_tx: watch::Sender<SupervisorState>,
}

impl<C: StreamConnector> StreamSupervisor<C> {
    /// Create a supervisor
    ///
    /// `commands` is the receiver returned by [`Broadcaster::new`].
    pub fn new(
        connector: C,
        filter: FilterParams,
        policy: ReconnectPolicy,
        broadcaster: Arc<Broadcaster>,
        commands: CommandReceiver,
    ) -> Self {
        let (state_tx, _) = watch::channel(SupervisorState::Idle);

        Self {
            connector,
            filter,
            policy,
            broadcaster,
            commands,
            state_tx,
        }
    }

    /// Current state
    pub fn state(&self) -> SupervisorState {
        *self.state_tx.borrow()
    }

    /// Spawn the supervisor task
    pub fn spawn(self) -> SupervisorHandle {
        let state = self.state_tx.subscribe();
        let task = tokio::spawn(self.run());

        SupervisorHandle { state, task }
    }

    /// Run until the broadcaster is dropped
    pub async fn run(mut self) {
        tracing::info!(track = %self.filter.track_param(), "Stream supervisor started");

        loop {
            self.set_state(SupervisorState::Idle);

            match self.commands.recv().await {
                Some(StreamCommand::EnsureStarted) => {}
                Some(StreamCommand::EnsureStopped) => continue,
                None => break,
            }

            if self.supervise().await == Flow::Shutdown {
                break;
            }
        }

        self.set_state(SupervisorState::Idle);
        tracing::info!("Stream supervisor stopped");
    }

    /// Keep a stream open until told to stop
    async fn supervise(&mut self) -> Flow {
        let mut failures: u32 = 0;

        loop {
            self.set_state(SupervisorState::Connecting);

            let opened = tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(StreamCommand::EnsureStarted) => continue,
                    Some(StreamCommand::EnsureStopped) => {
                        tracing::info!("Stop requested while connecting, abandoning attempt");
                        return Flow::Stopped;
                    }
                    None => return Flow::Shutdown,
                },
                result = self.connector.open(&self.filter) => result,
            };

            let stream = match opened {
                Ok(stream) => stream,
                Err(e) => {
                    failures = failures.saturating_add(1);
                    self.broadcaster.metrics().record_upstream_failure();
                    tracing::warn!(error = %e, failures = failures, "Upstream connect failed");

                    match self.back_off(failures).await {
                        Some(flow) => return flow,
                        None => continue,
                    }
                }
            };

            // The last viewer may have left while the handshake was completing
            if let Some(flow) = self.stop_pending() {
                tracing::info!("Stream opened after stop request, closing it");
                stream.close().await;
                return flow;
            }

            self.set_state(SupervisorState::Streaming);
            self.broadcaster.metrics().record_upstream_connect();
            tracing::info!(
                track = %self.filter.track_param(),
                viewers = self.broadcaster.subscriber_count(),
                "Stream start"
            );

            let (outcome, delivered) = self.stream(stream).await;
            match outcome {
                StreamOutcome::Stopped(flow) => return flow,
                StreamOutcome::Ended => {
                    tracing::info!(items = delivered, "Stream end");
                }
                StreamOutcome::Failed(e) => {
                    tracing::warn!(error = %e, items = delivered, "Error in upstream stream");
                }
            }
            self.broadcaster.metrics().record_upstream_failure();

            failures = if delivered > 0 {
                0
            } else {
                failures.saturating_add(1)
            };

            if let Some(flow) = self.back_off(failures).await {
                return flow;
            }
        }
    }

    /// Feed items from an open stream to the broadcaster
    async fn stream(&mut self, mut stream: C::Stream) -> (StreamOutcome, u64) {
        let mut delivered: u64 = 0;

        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(StreamCommand::EnsureStarted) => {
                        tracing::debug!("Start requested while already streaming");
                    }
                    Some(StreamCommand::EnsureStopped) => {
                        tracing::info!("0 viewers, disconnecting upstream stream");
                        stream.close().await;
                        return (StreamOutcome::Stopped(Flow::Stopped), delivered);
                    }
                    None => {
                        stream.close().await;
                        return (StreamOutcome::Stopped(Flow::Shutdown), delivered);
                    }
                },
                event = stream.next_event() => match event {
                    UpstreamEvent::Item(raw) => {
                        delivered += 1;
                        self.broadcaster.publish_item(&raw);
                    }
                    UpstreamEvent::End => return (StreamOutcome::Ended, delivered),
                    UpstreamEvent::Error(e) => return (StreamOutcome::Failed(e), delivered),
                },
            }
        }
    }

    /// Wait out the reconnect delay
    ///
    /// Returns `Some` if the supervising cycle must end instead of reconnecting.
    async fn back_off(&mut self, failures: u32) -> Option<Flow> {
        let delay = self.policy.delay(failures);
        if delay.is_zero() {
            return self.stop_pending();
        }

        self.set_state(SupervisorState::BackingOff);
        tracing::info!(
            delay_ms = delay.as_millis() as u64,
            failures = failures,
            "Reconnecting upstream after backoff"
        );

        tokio::select! {
            biased;
            command = self.commands.recv() => match command {
                Some(StreamCommand::EnsureStopped) => Some(Flow::Stopped),
                Some(StreamCommand::EnsureStarted) => None,
                None => Some(Flow::Shutdown),
            },
            _ = tokio::time::sleep(delay) => None,
        }
    }

    /// Consume queued commands, reporting a pending stop
    fn stop_pending(&mut self) -> Option<Flow> {
        loop {
            match self.commands.try_recv() {
                Ok(StreamCommand::EnsureStopped) => return Some(Flow::Stopped),
                Ok(StreamCommand::EnsureStarted) => continue,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => return Some(Flow::Shutdown),
            }
        }
    }

    fn set_state(&self, state: SupervisorState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Stream supervisor state changed");
        }
    }
}

/// Handle to a spawned supervisor
#[derive(Debug)]
pub struct SupervisorHandle {
    state: watch::Receiver<SupervisorState>,
    task: JoinHandle<()>,
}

impl SupervisorHandle {
    /// Current state
    pub fn state(&self) -> SupervisorState {
        *self.state.borrow()
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<SupervisorState> {
        self.state.clone()
    }

    /// Wait until the supervisor reaches `target`
    ///
    /// Returns false if the supervisor exited first.
    pub async fn wait_for(&self, target: SupervisorState) -> bool {
        let mut state = self.state.clone();
        let reached = state.wait_for(|s| *s == target).await.is_ok();
        reached
    }

    /// Stop the supervisor task
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Whether the task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
