use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::blocks::MessageTemplate;
use crate::events::{EventContext, EventDispatcher, HandlerResult, SlackEnvelope, SlackEvent};
use crate::transport::ChatTransport;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// True for transports that never yield envelopes.
    fn is_noop(&self) -> bool {
        false
    }
}

#[derive(Default)]
pub struct NoopSocketTransport;

#[async_trait]
impl SocketTransport for NoopSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    fn is_noop(&self) -> bool {
        true
    }
}

/// Pulls envelopes off a [`SocketTransport`], acknowledges them, and handles
/// each one on its own task so a slow event never holds up the others.
pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: Arc<EventDispatcher>,
    reconnect_policy: ReconnectPolicy,
    responder: Option<Arc<dyn ChatTransport>>,
}

impl Default for SocketModeRunner {
    fn default() -> Self {
        Self {
            transport: Arc::new(NoopSocketTransport),
            dispatcher: Arc::new(EventDispatcher::new()),
            reconnect_policy: ReconnectPolicy::default(),
            responder: None,
        }
    }
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher: Arc::new(dispatcher), reconnect_policy, responder: None }
    }

    /// Posts every `HandlerResult::Responded` message back to where the event came from.
    pub fn with_responder(mut self, responder: Arc<dyn ChatTransport>) -> Self {
        self.responder = Some(responder);
        self
    }

    pub fn is_noop_transport(&self) -> bool {
        self.transport.is_noop()
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "socket mode transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "socket mode retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening socket mode transport connection");
        self.transport.connect().await?;
        info!(attempt, "socket mode transport connected");

        let mut in_flight = JoinSet::new();
        let pumped = self.pump(attempt, &mut in_flight).await;

        let pending = in_flight.len();
        if pending > 0 {
            debug!(attempt, pending, "waiting for in-flight slack events");
        }
        while in_flight.join_next().await.is_some() {}

        pumped
    }

    async fn pump(&self, attempt: u32, in_flight: &mut JoinSet<()>) -> Result<(), TransportError> {
        loop {
            while in_flight.try_join_next().is_some() {}

            let Some(envelope) = self.transport.next_envelope().await? else {
                info!(attempt, "socket mode transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };
            let (channel_id, thread_id) = correlation_fields(&envelope);

            info!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                channel_id = channel_id.unwrap_or("unknown"),
                thread_id = thread_id.unwrap_or("unknown"),
                "received slack envelope"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    thread_id = thread_id.unwrap_or("unknown"),
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
            } else {
                debug!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    thread_id = thread_id.unwrap_or("unknown"),
                    "acknowledged slack envelope"
                );
            }

            in_flight.spawn(handle_envelope(
                self.dispatcher.clone(),
                self.responder.clone(),
                envelope,
            ));
        }
    }
}

async fn handle_envelope(
    dispatcher: Arc<EventDispatcher>,
    responder: Option<Arc<dyn ChatTransport>>,
    envelope: SlackEnvelope,
) {
    let context = EventContext { correlation_id: envelope.envelope_id.clone() };
    match dispatcher.dispatch(&envelope, &context).await {
        Ok(HandlerResult::Responded(message)) => {
            respond(responder.as_deref(), &envelope, &message).await;
        }
        Ok(_) => {}
        Err(error) => {
            let (_, thread_id) = correlation_fields(&envelope);
            warn!(
                envelope_id = %envelope.envelope_id,
                correlation_id = %envelope.envelope_id,
                thread_id = thread_id.unwrap_or("unknown"),
                error = %error,
                "event dispatch failed; continuing socket loop"
            );
        }
    }
}

async fn respond(
    responder: Option<&dyn ChatTransport>,
    envelope: &SlackEnvelope,
    message: &MessageTemplate,
) {
    let (Some(responder), Some((channel_id, thread_ts))) =
        (responder, envelope.event.reply_target())
    else {
        return;
    };

    if let Err(error) = responder.post_message(channel_id, thread_ts, message).await {
        warn!(
            event_name = "egress.slack.reply_failed",
            correlation_id = %envelope.envelope_id,
            channel_id,
            thread_id = thread_ts.unwrap_or("none"),
            error = %error,
            "failed to post reply"
        );
    }
}

fn correlation_fields(envelope: &SlackEnvelope) -> (Option<&str>, Option<&str>) {
    match &envelope.event {
        SlackEvent::Message(event) => {
            (Some(event.channel_id.as_str()), event.thread_ts.as_deref())
        }
        SlackEvent::SlashCommand(payload) => {
            (Some(payload.channel_id.as_str()), payload.thread_ts.as_deref())
        }
        SlackEvent::Unsupported { .. } => (None, None),
    }
}
