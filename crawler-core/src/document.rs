//! Opaque nested key-value records.
//!
//! The core never interprets scan result payloads — it only stores and
//! forwards them. `serde_json::Value` is the opaque-document representation
//! used everywhere a "document" is named in the component design; adapters
//! (the Mongo store, the broker codec) convert to/from their own wire
//! representation at the boundary.

pub type Document = serde_json::Value;

/// Builds an error document of the shape every error-status `ScanResult`
/// carries: `{"exception": {"message": ..., "kind": ...}}`.
pub fn exception_document(kind: &str, message: impl Into<String>) -> Document {
    serde_json::json!({
        "exception": {
            "kind": kind,
            "message": message.into(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_document_has_expected_shape() {
        let doc = exception_document("timeout", "scan exceeded 100ms");
        assert_eq!(doc["exception"]["kind"], "timeout");
        assert_eq!(doc["exception"]["message"], "scan exceeded 100ms");
    }
}
