use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_lite::stream::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
    BasicQosOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::envelope::enrich;
use crate::error::EventsError;

/// A future-returning message handler, boxed so `subscribe` can accept any
/// async closure without the trait itself becoming generic (and therefore
/// object-unsafe — `orchestrator::runner` stores an `Arc<dyn EventSink>`).
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), EventsError>> + Send>>;

/// Anything that can publish an enriched JSON payload under a routing key.
/// The only abstraction the orchestrator depends on directly — `EventBus`
/// is the real (lapin/AMQP) implementation; tests substitute an in-memory
/// recorder implementing the same trait.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, routing_key: &str, payload: Value) -> Result<(), EventsError>;
}

/// A durable topic-exchange client over RabbitMQ (via `lapin`), matching
/// the shape of `core/messaging.py`'s `MessageBroker`: one connection/channel
/// held for the process lifetime, the exchange declared lazily on first
/// publish, envelope fields (`event_id`, `timestamp`, `source`) filled in
/// if the caller didn't set them.
pub struct EventBus {
    _connection: Connection,
    channel: Channel,
    exchange: String,
    source: String,
    prefetch_count: u16,
    exchange_declared: OnceCell<()>,
}

impl EventBus {
    /// Opens the AMQP connection and channel eagerly; the exchange itself is
    /// declared lazily on first `publish`/`subscribe` — process-wide, with
    /// lazy initialization of the exchange.
    pub async fn connect(
        url: &str,
        exchange: &str,
        source: &str,
        prefetch_count: u16,
    ) -> Result<Self, EventsError> {
        let options = ConnectionProperties::default()
            .with_executor(tokio_executor_trait::Tokio::current())
            .with_reactor(tokio_reactor_trait::Tokio);

        let connection = Connection::connect(url, options).await?;
        let channel = connection.create_channel().await?;

        info!(exchange, %url, "event bus connection established");

        Ok(Self {
            _connection: connection,
            channel,
            exchange: exchange.to_string(),
            source: source.to_string(),
            prefetch_count,
            exchange_declared: OnceCell::new(),
        })
    }

    async fn ensure_exchange(&self) -> Result<(), EventsError> {
        self.exchange_declared
            .get_or_try_init(|| async {
                self.channel
                    .exchange_declare(
                        &self.exchange,
                        ExchangeKind::Topic,
                        ExchangeDeclareOptions {
                            durable: true,
                            ..Default::default()
                        },
                        FieldTable::default(),
                    )
                    .await?;
                Ok::<(), lapin::Error>(())
            })
            .await?;
        Ok(())
    }

    /// Declares a durable queue, binds it to `pattern` on the exchange, and
    /// consumes indefinitely. The handler's future is awaited per message;
    /// the message is acked only if it resolves `Ok`, and nacked with
    /// `requeue = true` otherwise — exactly the "ack after handler returns
    /// normally, requeue on exception" contract.
    pub async fn subscribe<F>(&self, pattern: &str, queue_name: &str, handler: F) -> Result<(), EventsError>
    where
        F: Fn(Value) -> HandlerFuture + Send + Sync + 'static,
    {
        self.ensure_exchange().await?;

        self.channel
            .basic_qos(self.prefetch_count, BasicQosOptions::default())
            .await?;

        self.channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        self.channel
            .queue_bind(
                queue_name,
                &self.exchange,
                pattern,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!(pattern, queue_name, "subscribed to routing key pattern");

        let mut consumer = self
            .channel
            .basic_consume(
                queue_name,
                "orchestrator-consumer",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        let handler = Arc::new(handler);
        while let Some(delivery) = consumer.next().await {
            let delivery = delivery?;
            let routing_key = delivery.routing_key.to_string();
            match serde_json::from_slice::<Value>(&delivery.data) {
                Ok(payload) => match handler(payload).await {
                    Ok(()) => {
                        debug!(routing_key, "message processed successfully");
                        delivery.ack(BasicAckOptions::default()).await?;
                    }
                    Err(err) => {
                        error!(routing_key, error = %err, "handler failed, requeuing message");
                        delivery
                            .nack(BasicNackOptions {
                                requeue: true,
                                ..Default::default()
                            })
                            .await?;
                    }
                },
                Err(err) => {
                    warn!(routing_key, error = %err, "dropping malformed message body");
                    delivery.ack(BasicAckOptions::default()).await?;
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventSink for EventBus {
    async fn publish(&self, routing_key: &str, payload: Value) -> Result<(), EventsError> {
        self.ensure_exchange().await?;

        let enriched = enrich(payload, &self.source);
        let body = serde_json::to_vec(&enriched)?;

        self.channel
            .basic_publish(
                &self.exchange,
                routing_key,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default().with_content_type("application/json".into()),
            )
            .await?
            .await?;

        debug!(routing_key, "published message");
        Ok(())
    }
}
