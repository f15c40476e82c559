use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use zeromq::prelude::*;
use zeromq::{PubSocket, SubSocket, ZmqMessage};

use crate::error::BusError;
use crate::message::Message;
use crate::traits::{EventPublisher, EventSubscriber};
use crate::transport::Transport;

/// ZeroMQ PUB socket.
///
/// Every message goes out as two frames: the topic string, then the
/// MessagePack [`Message`] envelope.
pub struct ZmqPublisher {
    socket: Mutex<PubSocket>,
}

impl ZmqPublisher {
    /// Bind and wait for subscribers to connect.
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn bind(transport: &Transport) -> Result<Self, BusError> {
        transport.ensure_ipc_dir()?;
        let mut socket = PubSocket::new();
        socket.bind(&transport.endpoint()).await?;
        info!("PUB socket bound");
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }

    /// Connect to a subscriber or forwarding device that binds.
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn connect(transport: &Transport) -> Result<Self, BusError> {
        let mut socket = PubSocket::new();
        socket.connect(&transport.endpoint()).await?;
        info!("PUB socket connected");
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }
}

#[async_trait]
impl EventPublisher for ZmqPublisher {
    async fn publish(&self, message: Message) -> Result<(), BusError> {
        let envelope = message.to_bytes()?;
        let mut frames = ZmqMessage::from(message.topic.as_str());
        frames.push_back(envelope.into());

        self.socket.lock().await.send(frames).await?;
        debug!(topic = %message.topic, correlation_id = %message.correlation_id, "published");
        Ok(())
    }
}

/// ZeroMQ SUB socket.
pub struct ZmqSubscriber {
    socket: Mutex<SubSocket>,
}

impl ZmqSubscriber {
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn connect(transport: &Transport) -> Result<Self, BusError> {
        let mut socket = SubSocket::new();
        socket.connect(&transport.endpoint()).await?;
        info!("SUB socket connected");
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }

    /// Bind so that several publishers can connect in.
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn bind(transport: &Transport) -> Result<Self, BusError> {
        transport.ensure_ipc_dir()?;
        let mut socket = SubSocket::new();
        socket.bind(&transport.endpoint()).await?;
        info!("SUB socket bound");
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }
}

#[async_trait]
impl EventSubscriber for ZmqSubscriber {
    async fn subscribe(&self, topic_prefix: &str) -> Result<(), BusError> {
        self.socket.lock().await.subscribe(topic_prefix).await?;
        info!(topic_prefix = %topic_prefix, "subscribed");
        Ok(())
    }

    async fn recv(&self) -> Result<Message, BusError> {
        let frames = self.socket.lock().await.recv().await?;

        // [topic, envelope]; a lone frame is taken to be the envelope itself.
        let envelope = match frames.len() {
            0 => return Err(BusError::Transport("empty ZMQ message".into())),
            1 => frames.get(0),
            _ => frames.get(1),
        }
        .ok_or_else(|| BusError::Transport("missing envelope frame".into()))?;

        let message = Message::from_bytes(envelope.as_ref())?;
        debug!(topic = %message.topic, correlation_id = %message.correlation_id, "received");
        Ok(message)
    }
}
