//! Data-access abstraction.
//! Handlers call these through dyn dispatch so the HTTP layer never touches the driver.

use async_trait::async_trait;
use mongodb::bson::{Document, oid::ObjectId};

use crate::document::{JsonDocument, Pagination};
use crate::error::Result;
use crate::models::{DatabaseInfo, DocumentPage, ServerStats};

/// Database, collection and document operations against one live server.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    async fn list_databases(&self) -> Result<Vec<String>>;

    /// Collection names plus a best-effort stats snapshot
    async fn get_database(&self, name: &str) -> Result<DatabaseInfo>;

    async fn create_database(&self, name: &str) -> Result<()>;

    async fn drop_database(&self, name: &str) -> Result<()>;

    async fn list_collections(&self, db: &str) -> Result<Vec<String>>;

    async fn create_collection(&self, db: &str, name: &str) -> Result<()>;

    async fn drop_collection(&self, db: &str, name: &str) -> Result<()>;

    /// Newest first by `_id`. `total` and the returned rows are not a consistent snapshot.
    async fn list_documents(
        &self,
        db: &str,
        collection: &str,
        pagination: Pagination,
    ) -> Result<DocumentPage>;

    async fn query_documents(
        &self,
        db: &str,
        collection: &str,
        filter: Document,
        pagination: Pagination,
    ) -> Result<DocumentPage>;

    async fn get_document(&self, db: &str, collection: &str, id: ObjectId)
    -> Result<JsonDocument>;

    /// Returns the inserted `_id`, hex-formatted when it is an ObjectId
    async fn create_document(
        &self,
        db: &str,
        collection: &str,
        document: Document,
    ) -> Result<serde_json::Value>;

    async fn update_document(
        &self,
        db: &str,
        collection: &str,
        id: ObjectId,
        document: Document,
    ) -> Result<()>;

    async fn delete_document(&self, db: &str, collection: &str, id: ObjectId) -> Result<()>;

    async fn server_stats(&self) -> Result<ServerStats>;
}

/// Checks that a candidate connection URI is reachable without keeping it.
#[async_trait]
pub trait ConnectionProbe: Send + Sync {
    async fn probe(&self, uri: &str) -> Result<()>;
}
