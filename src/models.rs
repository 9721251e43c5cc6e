//! Response types for database, document and server information.

use mongodb::bson::{Bson, Document};
use serde::Serialize;

use crate::document::{JsonDocument, Pagination};

/// Read a numeric field regardless of its BSON width. Missing or non-numeric
/// fields read as zero.
fn number(doc: &Document, key: &str) -> i64 {
    match doc.get(key) {
        Some(Bson::Int32(v)) => i64::from(*v),
        Some(Bson::Int64(v)) => *v,
        Some(Bson::Double(v)) => *v as i64,
        _ => 0,
    }
}

fn subdocument<'a>(doc: &'a Document, key: &str) -> Option<&'a Document> {
    doc.get_document(key).ok()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStats {
    pub collections: i64,
    pub objects: i64,
    pub data_size: i64,
    pub indexes: i64,
    pub index_size: i64,
    pub storage_size: i64,
}

impl DatabaseStats {
    /// Stats from a `dbStats` command reply.
    pub fn from_db_stats(reply: &Document) -> Self {
        Self {
            collections: number(reply, "collections"),
            objects: number(reply, "objects"),
            data_size: number(reply, "dataSize"),
            indexes: number(reply, "indexes"),
            index_size: number(reply, "indexSize"),
            storage_size: number(reply, "storageSize"),
        }
    }

    /// Fallback when `dbStats` is unavailable: only the collection count is known.
    pub fn collections_only(collections: usize) -> Self {
        Self {
            collections: collections as i64,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseInfo {
    pub name: String,
    pub collections: Vec<String>,
    pub stats: DatabaseStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentPage {
    pub documents: Vec<JsonDocument>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

impl DocumentPage {
    pub fn new(documents: Vec<JsonDocument>, total: u64, pagination: Pagination) -> Self {
        Self {
            documents,
            total,
            page: pagination.page(),
            limit: pagination.limit(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionCounts {
    pub current: i64,
    pub available: i64,
    pub total_created: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    /// MiB
    pub resident: i64,
    /// MiB
    pub r#virtual: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub mapped: i64,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStats {
    pub version: String,
    /// Seconds
    pub uptime: i64,
    pub connections: ConnectionCounts,
    #[serde(rename = "mem")]
    pub memory: MemoryStats,
    pub database_count: usize,
}

impl ServerStats {
    /// Stats from a `serverStatus` command reply.
    pub fn from_server_status(reply: &Document, database_count: usize) -> Self {
        let connections = subdocument(reply, "connections")
            .map(|c| ConnectionCounts {
                current: number(c, "current"),
                available: number(c, "available"),
                total_created: number(c, "totalCreated"),
            })
            .unwrap_or_default();

        let memory = subdocument(reply, "mem")
            .map(|m| MemoryStats {
                resident: number(m, "resident"),
                r#virtual: number(m, "virtual"),
                mapped: number(m, "mapped"),
            })
            .unwrap_or_default();

        Self {
            version: reply.get_str("version").unwrap_or_default().to_string(),
            uptime: number(reply, "uptime"),
            connections,
            memory,
            database_count,
        }
    }
}
