use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BusError;
use crate::message::Message;

/// Broadcast side of PUB/SUB.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, message: Message) -> Result<(), BusError>;
}

#[async_trait]
impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    async fn publish(&self, message: Message) -> Result<(), BusError> {
        (**self).publish(message).await
    }
}

/// Receiving side of PUB/SUB, filtered by topic prefix.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// An empty prefix receives everything.
    async fn subscribe(&self, topic_prefix: &str) -> Result<(), BusError>;

    /// Next matching message; waits until one arrives.
    async fn recv(&self) -> Result<Message, BusError>;
}
