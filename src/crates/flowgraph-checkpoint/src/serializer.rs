//! Pluggable serialization for checkpoint payloads
//!
//! Stores that persist bytes (filesystem, object storage, databases) go
//! through a [`SerializerProtocol`] so the wire format is a deployment
//! choice: [`JsonSerializer`] for debuggability, [`BincodeSerializer`] for
//! compactness.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Protocol for serializing and deserializing checkpoint data
pub trait SerializerProtocol: Send + Sync {
    /// Serialize a value to bytes
    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;

    /// Deserialize a value from bytes
    fn loads<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> Result<T>;

    /// File extension hint for filesystem-backed stores
    fn extension(&self) -> &'static str {
        "ckpt"
    }
}

/// JSON-based serializer (default)
#[derive(Debug, Clone, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl SerializerProtocol for JsonSerializer {
    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn loads<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(data)?)
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}

/// Binary serializer using bincode
///
/// Bincode is not self-describing: payloads containing dynamic
/// `serde_json::Value` state (the default checkpoint shape) cannot be read
/// back through it. Use this serializer only for fixed-shape payloads; stores
/// holding engine checkpoints should stay on [`JsonSerializer`].
#[derive(Debug, Clone, Default)]
pub struct BincodeSerializer;

impl BincodeSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl SerializerProtocol for BincodeSerializer {
    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(bincode::serialize(value)?)
    }

    fn loads<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> Result<T> {
        Ok(bincode::deserialize(data)?)
    }

    fn extension(&self) -> &'static str {
        "bin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::Checkpoint;
    use serde_json::json;

    fn sample() -> Checkpoint {
        Checkpoint::new("exec-1", 1, "a", vec!["a".into()], json!({"n": 7}))
    }

    #[test]
    fn json_serializer_roundtrip() {
        let serializer = JsonSerializer::new();
        let checkpoint = sample();

        let bytes = serializer.dumps(&checkpoint).unwrap();
        let restored: Checkpoint = serializer.loads(&bytes).unwrap();

        assert_eq!(checkpoint, restored);
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct FixedPayload {
        execution_id: String,
        step: u64,
        nodes: Vec<String>,
    }

    #[test]
    fn bincode_serializer_roundtrip_fixed_shape() {
        let serializer = BincodeSerializer::new();
        let payload = FixedPayload {
            execution_id: "exec-1".to_string(),
            step: 4,
            nodes: vec!["a".to_string(), "b".to_string()],
        };

        let bytes = serializer.dumps(&payload).unwrap();
        let restored: FixedPayload = serializer.loads(&bytes).unwrap();

        assert_eq!(payload, restored);
    }
}
