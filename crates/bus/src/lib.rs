pub mod error;
pub mod feed;
pub mod message;
pub mod messages;
pub mod pubsub;
pub mod traits;
pub mod transport;
pub mod worker;

pub use error::BusError;
pub use feed::{ChangePublisher, ZmqChangeFeed};
pub use message::Message;
pub use messages::events;
pub use messages::topics;
pub use pubsub::{ZmqPublisher, ZmqSubscriber};
pub use traits::{EventPublisher, EventSubscriber};
pub use transport::Transport;
pub use worker::{Worker, WorkerBuilder, WorkerRunner, WorkerRunnerConfig};
