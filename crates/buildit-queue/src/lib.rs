//! The message queue fabric (C5): durable, on-demand queues carrying
//! persistent JSON task messages between the dispatcher, the job
//! executor, and the autoscaling controller.
//!
//! Grounded on the original implementation's `backend/queue/producer.go`
//! (`ConnectRabbitMQ`/`DeclareQueue`/`EnqueueTask`) and `worker/queue/
//! worker.go` (`Qos`/`Consume`/explicit `Ack`/`Nack`), rebuilt on `lapin`
//! — the crate the `Kazy1014-ferrous-ci-cd` example manifest reaches for
//! in the same role.

pub mod error;

use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicGetOptions, BasicNackOptions, BasicPublishOptions,
    BasicQosOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Connection, ConnectionProperties};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use error::{QueueError, QueueResult};

pub struct QueueClient {
    channel: lapin::Channel,
    _connection: Connection,
}

impl QueueClient {
    pub async fn connect(url: &str) -> QueueResult<Self> {
        let connection = Connection::connect(url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        Ok(Self {
            channel,
            _connection: connection,
        })
    }

    /// Declare a durable, non-exclusive, non-auto-delete queue. Idempotent:
    /// declaring an already-existing queue with matching properties is a
    /// no-op.
    pub async fn declare_queue(&self, name: &str) -> QueueResult<()> {
        self.channel
            .queue_declare(
                name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(())
    }

    /// Publish `message` to `queue` as a persistent `application/json`
    /// message (survives broker restarts, matching the original's
    /// `amqp.Persistent` delivery mode).
    pub async fn publish<T: Serialize>(&self, queue: &str, message: &T) -> QueueResult<()> {
        let body = serde_json::to_vec(message)?;
        self.channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default()
                    .with_delivery_mode(2) // persistent
                    .with_content_type("application/json".into()),
            )
            .await?
            .await?;
        Ok(())
    }

    /// Set this channel's consumer prefetch (§5: per-consumer QoS, not a
    /// global channel-wide limit).
    pub async fn set_prefetch(&self, prefetch: u16) -> QueueResult<()> {
        self.channel
            .basic_qos(prefetch, BasicQosOptions { global: false })
            .await?;
        Ok(())
    }

    /// Begin consuming `queue` under manual ack/nack.
    pub async fn consume(&self, queue: &str, consumer_tag: &str) -> QueueResult<lapin::Consumer> {
        let consumer = self
            .channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        Ok(consumer)
    }

    /// Current depth of `queue`, declaring it first so a not-yet-existing
    /// queue reads as zero rather than erroring.
    pub async fn message_count(&self, queue: &str) -> QueueResult<u32> {
        let queue = self
            .channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(queue.message_count())
    }

    /// Pull a single message off `queue` under manual ack, without starting
    /// a standing consumer — matching the original's polling `Channel.Get`.
    /// `Ok(None)` means the queue was empty.
    pub async fn get_one(&self, queue: &str) -> QueueResult<Option<Delivery>> {
        match self.channel.basic_get(queue, BasicGetOptions::default()).await? {
            Some(message) => Ok(Some(message.delivery)),
            None => Ok(None),
        }
    }
}

/// Decode a delivery's JSON body into `T`.
pub fn decode<T: DeserializeOwned>(delivery: &Delivery) -> QueueResult<T> {
    Ok(serde_json::from_slice(&delivery.data)?)
}

/// Acknowledge successful processing.
pub async fn ack(delivery: &Delivery) -> QueueResult<()> {
    delivery.ack(BasicAckOptions::default()).await?;
    Ok(())
}

/// Reject a message that failed to parse or whose handler hit a
/// non-retryable error, dropping it without requeueing — matching the
/// original's `msg.Nack(false, false)`.
pub async fn nack_drop(delivery: &Delivery) -> QueueResult<()> {
    delivery
        .nack(BasicNackOptions {
            multiple: false,
            requeue: false,
        })
        .await?;
    Ok(())
}

/// Reject a message whose processing hit a transient failure, requeueing
/// it for another consumer to retry.
pub async fn nack_requeue(delivery: &Delivery) -> QueueResult<()> {
    delivery
        .nack(BasicNackOptions {
            multiple: false,
            requeue: true,
        })
        .await?;
    Ok(())
}

/// Drain a consumer stream item, surfacing transport errors.
pub async fn next_delivery(consumer: &mut lapin::Consumer) -> QueueResult<Option<Delivery>> {
    match consumer.next().await {
        Some(Ok(delivery)) => Ok(Some(delivery)),
        Some(Err(err)) => Err(err.into()),
        None => Ok(None),
    }
}
