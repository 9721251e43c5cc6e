//! Database access over the official MongoDB driver.
//!
//! One `Client` is shared by every request; the driver pools connections
//! internally. Each call gets its own fixed timeout and there is no retry.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    Client, Collection,
    bson::{Document, doc, oid::ObjectId},
    options::{ClientOptions, FindOptions},
};
use std::future::IntoFuture;
use std::time::Duration;

use crate::connection::{ConnectionProbe, DatabaseService};
use crate::document::{JsonDocument, Pagination, format_document, format_value};
use crate::error::{ConsoleError, Result};
use crate::models::{DatabaseInfo, DatabaseStats, DocumentPage, ServerStats};

/// MongoDB has no "create database" command; a database comes into existence
/// with its first collection.
const PLACEHOLDER_COLLECTION: &str = "init_collection";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Per data-access call
    pub operation_secs: u64,
    /// Connect + ping, and dropping a whole database
    pub connect_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            operation_secs: 5,
            connect_secs: 10,
        }
    }
}

async fn with_timeout<T, E, F>(operation: &'static str, secs: u64, fut: F) -> Result<T>
where
    F: IntoFuture<Output = std::result::Result<T, E>>,
    E: Into<ConsoleError>,
{
    match tokio::time::timeout(Duration::from_secs(secs), fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(ConsoleError::Timeout { operation, secs }),
    }
}

/// Create a client for `uri` and ping the server.
async fn open_client(uri: &str, timeouts: Timeouts) -> Result<Client> {
    let secs = timeouts.connect_secs;
    with_timeout("connect", secs, async {
        let mut client_options = ClientOptions::parse(uri).await?;
        client_options.connect_timeout = Some(Duration::from_secs(secs));
        client_options.server_selection_timeout = Some(Duration::from_secs(secs));

        let client = Client::with_options(client_options)?;
        client.database("admin").run_command(doc! { "ping": 1 }).await?;
        Ok::<_, ConsoleError>(client)
    })
    .await
}

/// Fields for a `$set` update. `_id` is immutable and dropped from the input.
fn set_fields(mut document: Document) -> Result<Document> {
    document.remove("_id");
    if document.is_empty() {
        return Err(ConsoleError::invalid("update document has no fields to set"));
    }
    Ok(doc! { "$set": document })
}

/// Newest first by `_id`, one page at a time.
fn find_options(pagination: Pagination) -> FindOptions {
    let mut find_options = FindOptions::default();
    find_options.sort = Some(doc! { "_id": -1 });
    find_options.skip = Some(pagination.skip());
    find_options.limit = Some(pagination.limit() as i64);
    find_options
}

/// `dbStats` can be refused (e.g. missing privileges); the collection count
/// is still known from the listing.
fn stats_or_fallback(
    reply: mongodb::error::Result<Document>,
    collection_count: usize,
) -> DatabaseStats {
    match reply {
        Ok(reply) => DatabaseStats::from_db_stats(&reply),
        Err(e) => {
            tracing::debug!("dbStats failed, using collection count: {e}");
            DatabaseStats::collections_only(collection_count)
        }
    }
}

pub struct MongoService {
    client: Client,
    timeouts: Timeouts,
}

impl MongoService {
    pub async fn connect(uri: &str, timeouts: Timeouts) -> Result<Self> {
        let client = open_client(uri, timeouts).await?;
        tracing::info!("Connected to MongoDB");
        Ok(Self { client, timeouts })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn collection(&self, db: &str, collection: &str) -> Collection<Document> {
        self.client.database(db).collection::<Document>(collection)
    }

    async fn timed<T, E, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: IntoFuture<Output = std::result::Result<T, E>>,
        E: Into<ConsoleError>,
    {
        tracing::debug!("Running {operation}");
        with_timeout(operation, self.timeouts.operation_secs, fut).await
    }
}

#[async_trait]
impl DatabaseService for MongoService {
    async fn list_databases(&self) -> Result<Vec<String>> {
        self.timed("listDatabases", self.client.list_database_names())
            .await
    }

    async fn get_database(&self, name: &str) -> Result<DatabaseInfo> {
        let db = self.client.database(name);

        self.timed("getDatabase", async {
            let collections = db.list_collection_names().await?;

            let reply = db.run_command(doc! { "dbStats": 1 }).await;
            let stats = stats_or_fallback(reply, collections.len());

            Ok::<_, ConsoleError>(DatabaseInfo {
                name: name.to_string(),
                collections,
                stats,
            })
        })
        .await
    }

    async fn create_database(&self, name: &str) -> Result<()> {
        tracing::info!("Creating database '{name}'");
        self.timed(
            "createDatabase",
            self.client
                .database(name)
                .create_collection(PLACEHOLDER_COLLECTION),
        )
        .await
    }

    async fn drop_database(&self, name: &str) -> Result<()> {
        tracing::info!("Dropping database '{name}'");
        with_timeout(
            "dropDatabase",
            self.timeouts.connect_secs,
            self.client.database(name).drop(),
        )
        .await
    }

    async fn list_collections(&self, db: &str) -> Result<Vec<String>> {
        self.timed(
            "listCollections",
            self.client.database(db).list_collection_names(),
        )
        .await
    }

    async fn create_collection(&self, db: &str, name: &str) -> Result<()> {
        tracing::info!("Creating collection {db}.{name}");
        self.timed(
            "createCollection",
            self.client.database(db).create_collection(name),
        )
        .await
    }

    async fn drop_collection(&self, db: &str, name: &str) -> Result<()> {
        tracing::info!("Dropping collection {db}.{name}");
        self.timed("dropCollection", self.collection(db, name).drop())
            .await
    }

    async fn list_documents(
        &self,
        db: &str,
        collection: &str,
        pagination: Pagination,
    ) -> Result<DocumentPage> {
        self.query_documents(db, collection, Document::new(), pagination)
            .await
    }

    async fn query_documents(
        &self,
        db: &str,
        collection: &str,
        filter: Document,
        pagination: Pagination,
    ) -> Result<DocumentPage> {
        let coll = self.collection(db, collection);

        self.timed("findDocuments", async {
            let total = coll.count_documents(filter.clone()).await?;

            let cursor = coll
                .find(filter)
                .with_options(find_options(pagination))
                .await?;
            let documents: Vec<Document> = cursor.try_collect().await?;

            Ok::<_, ConsoleError>(DocumentPage::new(
                documents.into_iter().map(format_document).collect(),
                total,
                pagination,
            ))
        })
        .await
    }

    async fn get_document(
        &self,
        db: &str,
        collection: &str,
        id: ObjectId,
    ) -> Result<JsonDocument> {
        let document = self
            .timed(
                "findDocument",
                self.collection(db, collection).find_one(doc! { "_id": id }),
            )
            .await?
            .ok_or_else(|| ConsoleError::not_found(format!("document '{id}'")))?;

        Ok(format_document(document))
    }

    async fn create_document(
        &self,
        db: &str,
        collection: &str,
        document: Document,
    ) -> Result<serde_json::Value> {
        let result = self
            .timed(
                "insertDocument",
                self.collection(db, collection).insert_one(document),
            )
            .await?;

        Ok(format_value(result.inserted_id))
    }

    async fn update_document(
        &self,
        db: &str,
        collection: &str,
        id: ObjectId,
        document: Document,
    ) -> Result<()> {
        let update = set_fields(document)?;
        let result = self
            .timed(
                "updateDocument",
                self.collection(db, collection)
                    .update_one(doc! { "_id": id }, update),
            )
            .await?;

        if result.matched_count == 0 {
            return Err(ConsoleError::not_found(format!("document '{id}'")));
        }
        Ok(())
    }

    async fn delete_document(&self, db: &str, collection: &str, id: ObjectId) -> Result<()> {
        let result = self
            .timed(
                "deleteDocument",
                self.collection(db, collection).delete_one(doc! { "_id": id }),
            )
            .await?;

        if result.deleted_count == 0 {
            return Err(ConsoleError::not_found(format!("document '{id}'")));
        }
        Ok(())
    }

    async fn server_stats(&self) -> Result<ServerStats> {
        self.timed("serverStatus", async {
            let reply = self
                .client
                .database("admin")
                .run_command(doc! { "serverStatus": 1 })
                .await?;
            let databases = self.client.list_database_names().await?;

            Ok::<_, ConsoleError>(ServerStats::from_server_status(&reply, databases.len()))
        })
        .await
    }
}

/// Connects to a candidate URI, pings it and disconnects.
pub struct MongoProbe {
    timeouts: Timeouts,
}

impl MongoProbe {
    pub fn new(timeouts: Timeouts) -> Self {
        Self { timeouts }
    }
}

#[async_trait]
impl ConnectionProbe for MongoProbe {
    async fn probe(&self, uri: &str) -> Result<()> {
        let client = open_client(uri, self.timeouts).await?;
        client.shutdown().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_elapsed() {
        let result: Result<()> =
            with_timeout("slowOp", 0, std::future::pending::<Result<()>>()).await;

        match result {
            Err(ConsoleError::Timeout { operation, secs }) => {
                assert_eq!(operation, "slowOp");
                assert_eq!(secs, 0);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_with_timeout_passes_errors_through() {
        let result: Result<()> = with_timeout("op", 5, async {
            Err::<(), _>(ConsoleError::not_found("collection 'x'"))
        })
        .await;

        assert!(matches!(result, Err(ConsoleError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_uri() {
        let result = MongoService::connect("not-a-mongodb-uri", Timeouts::default()).await;
        assert!(matches!(result, Err(ConsoleError::Upstream(_))));
    }

    #[test]
    fn test_set_fields_drops_id() {
        let id = ObjectId::new();
        let update = set_fields(doc! { "_id": id.to_hex(), "name": "renamed" }).unwrap();
        assert_eq!(update, doc! { "$set": { "name": "renamed" } });
    }

    #[test]
    fn test_set_fields_rejects_empty() {
        assert!(matches!(
            set_fields(doc! { "_id": 1 }),
            Err(ConsoleError::InvalidInput(_))
        ));
        assert!(matches!(
            set_fields(Document::new()),
            Err(ConsoleError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_find_options_sort_newest_first() {
        let options = find_options(Pagination::clamp(Some(3), Some(20)));
        assert_eq!(options.sort, Some(doc! { "_id": -1 }));
        assert_eq!(options.skip, Some(40));
        assert_eq!(options.limit, Some(20));

        let options = find_options(Pagination::default());
        assert_eq!(options.skip, Some(0));
        assert_eq!(options.limit, Some(20));
    }

    #[test]
    fn test_stats_from_reply() {
        let reply = doc! {
            "collections": 3,
            "objects": 120_i64,
            "dataSize": 4096.0,
            "storageSize": 8192,
            "indexes": 4,
            "indexSize": 1024,
        };
        let stats = stats_or_fallback(Ok(reply.clone()), 99);
        assert_eq!(stats, DatabaseStats::from_db_stats(&reply));
        assert_eq!(stats.collections, 3);
    }

    #[test]
    fn test_stats_fall_back_to_collection_count() {
        let err = mongodb::error::Error::from(std::io::Error::other("not authorized"));
        let stats = stats_or_fallback(Err(err), 7);
        assert_eq!(stats, DatabaseStats::collections_only(7));
        assert_eq!(stats.collections, 7);
        assert_eq!(stats.objects, 0);
    }

    #[test]
    fn test_placeholder_collection_name() {
        assert_eq!(PLACEHOLDER_COLLECTION, "init_collection");
    }

    #[test]
    fn test_default_timeouts() {
        let timeouts = Timeouts::default();
        assert_eq!(timeouts.operation_secs, 5);
        assert_eq!(timeouts.connect_secs, 10);
    }
}
