//! MongoDB-backed [`Persistence`] adapter.

use super::{check_status_matches, Persistence};
use crate::error::PersistenceError;
use async_trait::async_trait;
use bson::doc;
use crawler_core::{BulkScan, JobStatus, ScanJobDescription, ScanResult};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use std::collections::HashSet;
use tokio::sync::Mutex;
use tracing::warn;

/// One Mongo connection, with a memo of which result collections already
/// have their secondary indexes created so `insertScanResult` doesn't
/// reissue `createIndexes` on every call.
pub struct MongoPersistence {
    client: Client,
    indexed_collections: Mutex<HashSet<String>>,
}

impl MongoPersistence {
    pub async fn connect(uri: &str) -> Result<Self, PersistenceError> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| PersistenceError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            indexed_collections: Mutex::new(HashSet::new()),
        })
    }

    fn bulk_scans(&self, db_name: &str) -> Collection<bson::Document> {
        self.client.database(db_name).collection("bulkScans")
    }

    fn results(&self, db_name: &str, collection_name: &str) -> Collection<bson::Document> {
        self.client.database(db_name).collection(collection_name)
    }

    async fn ensure_result_indexes(
        &self,
        db_name: &str,
        collection_name: &str,
    ) -> Result<(), PersistenceError> {
        let key = format!("{db_name}.{collection_name}");
        {
            let seen = self.indexed_collections.lock().await;
            if seen.contains(&key) {
                return Ok(());
            }
        }

        let collection = self.results(db_name, collection_name);
        let fields = [
            "scanTarget.ip",
            "scanTarget.hostname",
            "scanTarget.trancoRank",
            "scanTarget.resultStatus",
        ];
        let models: Vec<IndexModel> = fields
            .into_iter()
            .map(|field| {
                IndexModel::builder()
                    .keys(doc! { field: 1 })
                    .options(IndexOptions::builder().build())
                    .build()
            })
            .collect();

        collection
            .create_indexes(models)
            .await
            .map_err(|e| PersistenceError::Connection(e.to_string()))?;

        self.indexed_collections.lock().await.insert(key);
        Ok(())
    }

    fn encode(result: &ScanResult) -> Result<bson::Document, PersistenceError> {
        bson::to_document(result).map_err(|e| PersistenceError::Encoding(e.to_string()))
    }

    /// Applies the encode-failure fallback chain: encode `result` as-is;
    /// on failure, build and encode a `SERIALIZATION_ERROR` record instead;
    /// if that *also* fails to encode, give up as `INTERNAL_ERROR` without
    /// attempting a third write (the recursion guard). Returns the result
    /// that actually reflects what was (or wasn't) written, alongside the
    /// document to write, if any.
    ///
    /// Parameterized over the encode step — rather than calling
    /// `Self::encode` directly — purely so a unit test can force the
    /// second-stage encode to fail without needing a value that is
    /// unencodable twice over (the real `SERIALIZATION_ERROR` document is
    /// built entirely from strings, so it always encodes in practice).
    fn resolve_for_storage(
        result: ScanResult,
        mut encode: impl FnMut(&ScanResult) -> Result<bson::Document, PersistenceError>,
    ) -> (ScanResult, Option<bson::Document>) {
        match encode(&result) {
            Ok(doc) => (result, Some(doc)),
            Err(first_err) => {
                warn!(error = %first_err, "scan result failed to encode, retrying as SERIALIZATION_ERROR");
                let fallback = ScanResult::from_exception(
                    result.bulk_scan_id.clone(),
                    result.scan_target.clone(),
                    JobStatus::SerializationError,
                    "serialization",
                    first_err.to_string(),
                )
                .expect("SerializationError is an error status");

                match encode(&fallback) {
                    Ok(doc) => (fallback, Some(doc)),
                    Err(second_err) => {
                        warn!(
                            error = %second_err,
                            "SERIALIZATION_ERROR record also failed to encode, giving up as INTERNAL_ERROR"
                        );
                        // No further write is attempted — this is the recursion guard the
                        // component design requires.
                        let internal_error = ScanResult::from_exception(
                            result.bulk_scan_id,
                            result.scan_target,
                            JobStatus::InternalError,
                            "serialization",
                            second_err.to_string(),
                        )
                        .expect("InternalError is an error status");
                        (internal_error, None)
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Persistence for MongoPersistence {
    async fn insert_bulk_scan(&self, scan: &mut BulkScan) -> Result<(), PersistenceError> {
        // Generated client-side so the same value backs both the Rust-side
        // `scan.id` (hex string, carried in job messages and the HTTP
        // notification) and Mongo's real `_id` key. Letting Mongo assign
        // its own `_id` would leave `scan.id` pointing at a field the
        // driver never writes, and `update_bulk_scan`'s filter would then
        // compare a hex string against a document whose real `_id` is an
        // `ObjectId` — never matching.
        let oid = bson::oid::ObjectId::new();
        scan.id = Some(oid.to_hex());
        let mut doc = bson::to_document(&*scan).map_err(|e| PersistenceError::Encoding(e.to_string()))?;
        doc.remove("id");
        doc.insert("_id", oid);
        self.bulk_scans(&scan.name)
            .insert_one(doc)
            .await
            .map_err(|e| PersistenceError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn update_bulk_scan(&self, scan: &BulkScan) -> Result<(), PersistenceError> {
        let id = scan
            .id
            .as_ref()
            .ok_or_else(|| PersistenceError::Rejected {
                operation: "update_bulk_scan",
                reason: "scan has no assigned id".into(),
            })?;
        let oid = bson::oid::ObjectId::parse_str(id)
            .map_err(|e| PersistenceError::Encoding(format!("scan.id {id:?} is not a valid ObjectId hex string: {e}")))?;
        let mut doc = bson::to_document(scan).map_err(|e| PersistenceError::Encoding(e.to_string()))?;
        doc.remove("id");
        doc.insert("_id", oid);
        self.bulk_scans(&scan.name)
            .replace_one(doc! { "_id": oid }, doc)
            .await
            .map_err(|e| PersistenceError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn insert_scan_result(
        &self,
        result: ScanResult,
        job: &ScanJobDescription,
    ) -> Result<ScanResult, PersistenceError> {
        check_status_matches(&result, job)?;
        self.ensure_result_indexes(&job.db_name, &job.collection_name).await?;

        let (final_result, doc) = Self::resolve_for_storage(result, Self::encode);
        if let Some(doc) = doc {
            self.results(&job.db_name, &job.collection_name)
                .insert_one(doc)
                .await
                .map_err(|e| PersistenceError::Connection(e.to_string()))?;
        }
        Ok(final_result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crawler_core::ScanTarget;

    fn unencodable_result() -> ScanResult {
        // BSON has no unsigned 64-bit integer type; any document holding
        // one bigger than i64::MAX is exactly the kind of value that drives
        // a real deployment into the SERIALIZATION_ERROR fallback path.
        ScanResult::new(
            "bulk-1".to_string(),
            ScanTarget::new(None, Some("127.0.0.1".parse().unwrap()), 443, None),
            JobStatus::Success,
            serde_json::json!({ "huge": u64::MAX }),
        )
    }

    #[test]
    fn encode_rejects_a_u64_that_overflows_bson_i64() {
        assert!(MongoPersistence::encode(&unencodable_result()).is_err());
    }

    #[test]
    fn first_stage_failure_falls_back_to_a_writable_serialization_error_record() {
        let (final_result, doc) = MongoPersistence::resolve_for_storage(unencodable_result(), MongoPersistence::encode);

        assert_eq!(final_result.job_status, JobStatus::SerializationError);
        assert!(doc.is_some());
    }

    #[test]
    fn recursive_encoding_failure_yields_internal_error_with_no_further_write() {
        // Forces every encode attempt to fail, so the SERIALIZATION_ERROR
        // fallback built from `unencodable_result()` also fails to encode —
        // the path the real fallback document (built only from strings)
        // never actually takes.
        let calls = std::cell::Cell::new(0u32);
        let (final_result, doc) = MongoPersistence::resolve_for_storage(unencodable_result(), |_| {
            calls.set(calls.get() + 1);
            Err(PersistenceError::Encoding("forced failure".into()))
        });

        assert_eq!(calls.get(), 2, "both the original and the SERIALIZATION_ERROR fallback should be tried once");
        assert_eq!(final_result.job_status, JobStatus::InternalError);
        assert!(doc.is_none(), "the recursion guard must not attempt a third write");
    }
}
