use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current envelope schema version.
pub const ENVELOPE_VERSION: u16 = 1;

/// Wire envelope for everything published on the bus.
///
/// Both the envelope and its payload are MessagePack. The `topic` is repeated
/// in the first ZeroMQ frame so subscribers can prefix-filter without decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub topic: String,

    /// MessagePack-encoded payload bytes.
    #[serde(with = "raw_bytes")]
    pub payload: Vec<u8>,

    pub sent_at: DateTime<Utc>,

    /// Lets a batch be followed through publisher and subscriber logs.
    pub correlation_id: Uuid,

    #[serde(default = "default_version")]
    pub version: u16,
}

fn default_version() -> u16 {
    ENVELOPE_VERSION
}

impl Message {
    pub fn new<T: Serialize>(
        topic: impl Into<String>,
        payload: &T,
    ) -> Result<Self, rmp_serde::encode::Error> {
        Ok(Self {
            topic: topic.into(),
            payload: rmp_serde::to_vec_named(payload)?,
            sent_at: Utc::now(),
            correlation_id: Uuid::new_v4(),
            version: ENVELOPE_VERSION,
        })
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, rmp_serde::decode::Error> {
        rmp_serde::from_slice(&self.payload)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}

/// Encode `Vec<u8>` as a MessagePack bin instead of an array of integers.
mod raw_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let bytes: &[u8] = Deserialize::deserialize(d)?;
        Ok(bytes.to_vec())
    }
}
