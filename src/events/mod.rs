//! Event bus adapter.
//! Mission: Durable, at-least-once publish/subscribe with queue groups,
//! manual ack/nack, and bounded in-flight (spec §4.4).

pub mod subjects;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_nats::jetstream::{
    self,
    consumer::{pull::Config as PullConfig, AckPolicy, DeliverPolicy},
    stream::Config as StreamConfig,
};
use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const RECONNECT_BACKOFF: Duration = Duration::from_secs(3);
const MESSAGE_DEADLINE: Duration = Duration::from_secs(30);
const MAX_IN_FLIGHT: usize = 10;

/// What a [`EventBus::subscribe`] handler returns: `Ok(())` acks, `Err`
/// nacks and triggers a bus-side redelivery (spec §4.4).
pub type HandlerResult = std::result::Result<(), anyhow::Error>;
pub type Handler = Arc<dyn Fn(Vec<u8>) -> Pin<Box<dyn Future<Output = HandlerResult> + Send>> + Send + Sync>;

#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish_bytes(&self, subject: &str, msg_id: &str, payload: Vec<u8>) -> Result<()>;
    async fn subscribe(&self, subject: &str, group: &str, handler: Handler, shutdown: CancellationToken) -> Result<()>;
}

/// Convenience for callers with a typed payload — kept outside the trait so
/// `EventBus` stays object-safe (`Arc<dyn EventBus>` is how it's threaded
/// through the orchestrator and the indexer).
pub async fn publish_json<B: EventBus + ?Sized, T: Serialize>(bus: &B, subject: &str, msg_id: &str, payload: &T) -> Result<()> {
    let bytes = serde_json::to_vec(payload).context("failed to serialize event payload")?;
    bus.publish_bytes(subject, msg_id, bytes).await
}

pub struct NatsEventBus {
    jetstream: jetstream::Context,
    stream_name: String,
}

impl NatsEventBus {
    /// Connect with infinite reconnect attempts and a bounded backoff — a
    /// permanent disconnect is surfaced to the caller, which exits the
    /// process so the supervisor restarts with a fresh connection
    /// (spec §4.4).
    pub async fn connect(endpoint: &str, stream_name: &str, subjects: &[&str]) -> Result<Self> {
        let client = async_nats::ConnectOptions::new()
            .retry_on_initial_connect()
            .reconnect_delay_callback(|_attempts| RECONNECT_BACKOFF)
            .connect(endpoint)
            .await
            .context("failed to connect to nats")?;

        let jetstream = jetstream::new(client);

        jetstream
            .get_or_create_stream(StreamConfig {
                name: stream_name.to_string(),
                subjects: subjects.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            })
            .await
            .context("failed to ensure event stream exists")?;

        Ok(Self { jetstream, stream_name: stream_name.to_string() })
    }
}

#[async_trait]
impl EventBus for NatsEventBus {
    async fn publish_bytes(&self, subject: &str, msg_id: &str, payload: Vec<u8>) -> Result<()> {
        let mut headers = async_nats::HeaderMap::new();
        headers.insert("Nats-Msg-Id", msg_id);
        self.jetstream
            .publish_with_headers(subject.to_string(), headers, payload.into())
            .await
            .context("failed to publish event")?
            .await
            .context("event publish was not acked by the stream")?;
        Ok(())
    }

    /// A durable pull consumer named after `group` gives us the queue-group
    /// semantics spec §4.4 asks for: every subscriber sharing a group name
    /// competes for the same durable, so each message is delivered once per
    /// group regardless of how many processes subscribe.
    async fn subscribe(&self, subject: &str, group: &str, handler: Handler, shutdown: CancellationToken) -> Result<()> {
        let stream = self
            .jetstream
            .get_stream(&self.stream_name)
            .await
            .context("event stream missing at subscribe time")?;

        let consumer = stream
            .get_or_create_consumer(
                group,
                PullConfig {
                    durable_name: Some(group.to_string()),
                    filter_subject: subject.to_string(),
                    ack_policy: AckPolicy::Explicit,
                    deliver_policy: DeliverPolicy::All,
                    max_ack_pending: MAX_IN_FLIGHT as i64,
                    ack_wait: MESSAGE_DEADLINE,
                    ..Default::default()
                },
            )
            .await
            .context("failed to create durable consumer")?;

        let semaphore = Arc::new(Semaphore::new(MAX_IN_FLIGHT));
        let mut messages = consumer.messages().await.context("failed to start message stream")?;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(subject, group, "draining in-flight handlers before shutdown");
                    let _ = semaphore.acquire_many(MAX_IN_FLIGHT as u32).await;
                    return Ok(());
                }
                next = messages.next() => {
                    let Some(message) = next else {
                        warn!(subject, group, "event stream closed, reconnect required");
                        return Err(anyhow::anyhow!("nats message stream ended"));
                    };
                    let message = match message {
                        Ok(message) => message,
                        Err(err) => {
                            error!(error = %err, subject, group, "failed to pull message");
                            continue;
                        }
                    };

                    let permit = semaphore.clone().acquire_owned().await.context("semaphore closed")?;
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        let payload = message.message.payload.to_vec();
                        match tokio::time::timeout(MESSAGE_DEADLINE, handler(payload)).await {
                            Ok(Ok(())) => {
                                if let Err(err) = message.ack().await {
                                    error!(error = ?err, "failed to ack message");
                                }
                            }
                            Ok(Err(err)) => {
                                warn!(error = %err, "handler nacked message");
                                if let Err(err) = message.ack_with(jetstream::AckKind::Nak(None)).await {
                                    error!(error = ?err, "failed to nack message");
                                }
                            }
                            Err(_) => {
                                warn!("handler exceeded per-message deadline, nacking");
                                if let Err(err) = message.ack_with(jetstream::AckKind::Nak(None)).await {
                                    error!(error = ?err, "failed to nack timed-out message");
                                }
                            }
                        }
                    });
                }
            }
        }
    }
}
