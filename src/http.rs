//! HTTP API: routes JSON requests onto the connection store and the database service.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use mongodb::bson::Document;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use crate::connection::{ConnectionProbe, DatabaseService};
use crate::document::{JsonDocument, Pagination, parse_object_id};
use crate::error::{ConsoleError, Result};
use crate::models::{DatabaseInfo, DocumentPage, ServerStats};
use crate::pages;
use crate::profile::ConnectionProfile;
use crate::store::ConnectionStore;

/// Everything a handler can reach. Constructed once in `main`.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<dyn DatabaseService>,
    pub store: Arc<ConnectionStore>,
    pub probe: Arc<dyn ConnectionProbe>,
}

impl IntoResponse for ConsoleError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        tracing::warn!(status = status.as_u16(), "Request failed: {self}");
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Unwrap a JSON body, turning extractor rejections into `InvalidInput`.
fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ConsoleError::invalid(rejection.body_text()))
}

fn message(text: &str) -> Json<Value> {
    Json(json!({ "message": text }))
}

/// Build the full application router (API and pages).
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/connections",
            get(list_connections).post(add_connection),
        )
        .route("/connections/current", get(current_connection))
        .route("/connections/test", post(test_connection))
        .route(
            "/connections/:id",
            get(get_connection)
                .put(update_connection)
                .delete(delete_connection),
        )
        .route("/connections/:id/current", post(set_current_connection))
        .route("/databases", get(list_databases).post(create_database))
        .route("/databases/:name", get(get_database).delete(drop_database))
        .route("/stats", get(server_stats))
        .route(
            "/db/:db/collections",
            get(list_collections).post(create_collection),
        )
        .route("/db/:db/collections/:collection", delete(drop_collection))
        .route(
            "/db/:db/collections/:collection/documents",
            get(list_documents).post(create_document),
        )
        .route(
            "/db/:db/collections/:collection/documents/:id",
            get(get_document)
                .put(update_document)
                .delete(delete_document),
        )
        .route(
            "/db/:db/collections/:collection/query",
            post(query_documents),
        );

    Router::new()
        .merge(pages::routes())
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve(
    state: AppState,
    addr: &str,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

async fn list_connections(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "connections": state.store.list(),
        "currentId": state.store.current_id(),
    }))
}

async fn get_connection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConnectionProfile>> {
    state.store.get(&id).map(Json)
}

async fn add_connection(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ConnectionProfile>, JsonRejection>,
) -> Result<Json<Value>> {
    let added = state.store.add(body(payload)?)?;
    Ok(Json(json!({
        "message": "Connection added successfully",
        "id": added.id,
    })))
}

async fn update_connection(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<ConnectionProfile>, JsonRejection>,
) -> Result<Json<Value>> {
    state.store.update(&id, body(payload)?)?;
    Ok(message("Connection updated successfully"))
}

async fn delete_connection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    state.store.delete(&id)?;
    Ok(message("Connection deleted successfully"))
}

async fn set_current_connection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    state.store.set_current(&id)?;
    Ok(message("Current connection set successfully"))
}

async fn current_connection(State(state): State<AppState>) -> Result<Json<ConnectionProfile>> {
    state
        .store
        .current()
        .map(Json)
        .ok_or_else(|| ConsoleError::not_found("current connection"))
}

/// Connectivity check for an unsaved profile. Nothing is persisted.
async fn test_connection(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ConnectionProfile>, JsonRejection>,
) -> Result<Response> {
    let profile = body(payload)?;

    match state.probe.probe(&profile.uri()).await {
        Ok(()) => Ok(message("Connection successful").into_response()),
        Err(e) => {
            tracing::warn!("Connection test to {}:{} failed: {e}", profile.host, profile.port);
            Ok((
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("Failed to connect: {e}") })),
            )
                .into_response())
        }
    }
}

// ---------------------------------------------------------------------------
// Databases and collections
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct NameRequest {
    #[serde(default)]
    name: String,
}

impl NameRequest {
    fn into_name(self) -> Result<String> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ConsoleError::invalid("name is required"));
        }
        Ok(name)
    }
}

async fn list_databases(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    state.service.list_databases().await.map(Json)
}

async fn get_database(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<DatabaseInfo>> {
    state.service.get_database(&name).await.map(Json)
}

async fn create_database(
    State(state): State<AppState>,
    payload: std::result::Result<Json<NameRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let name = body(payload)?.into_name()?;
    state.service.create_database(&name).await?;
    Ok(message("Database created successfully"))
}

async fn drop_database(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>> {
    state.service.drop_database(&name).await?;
    Ok(message("Database deleted successfully"))
}

async fn server_stats(State(state): State<AppState>) -> Result<Json<ServerStats>> {
    state.service.server_stats().await.map(Json)
}

async fn list_collections(
    State(state): State<AppState>,
    Path(db): Path<String>,
) -> Result<Json<Vec<String>>> {
    state.service.list_collections(&db).await.map(Json)
}

async fn create_collection(
    State(state): State<AppState>,
    Path(db): Path<String>,
    payload: std::result::Result<Json<NameRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let name = body(payload)?.into_name()?;
    state.service.create_collection(&db, &name).await?;
    Ok(message("Collection created successfully"))
}

async fn drop_collection(
    State(state): State<AppState>,
    Path((db, collection)): Path<(String, String)>,
) -> Result<Json<Value>> {
    state.service.drop_collection(&db, &collection).await?;
    Ok(message("Collection deleted successfully"))
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Raw `page`/`limit` query parameters; bad values fall back to defaults.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageParams {
    pub fn pagination(&self) -> Pagination {
        Pagination::from_query(self.page.as_deref(), self.limit.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    #[serde(default)]
    query: Option<Document>,
    #[serde(default)]
    page: Option<i64>,
    #[serde(default)]
    limit: Option<i64>,
}

async fn list_documents(
    State(state): State<AppState>,
    Path((db, collection)): Path<(String, String)>,
    Query(params): Query<PageParams>,
) -> Result<Json<DocumentPage>> {
    state
        .service
        .list_documents(&db, &collection, params.pagination())
        .await
        .map(Json)
}

async fn query_documents(
    State(state): State<AppState>,
    Path((db, collection)): Path<(String, String)>,
    payload: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<DocumentPage>> {
    let request = body(payload)?;
    let pagination = Pagination::clamp(request.page, request.limit);

    state
        .service
        .query_documents(
            &db,
            &collection,
            request.query.unwrap_or_default(),
            pagination,
        )
        .await
        .map(Json)
}

async fn get_document(
    State(state): State<AppState>,
    Path((db, collection, id)): Path<(String, String, String)>,
) -> Result<Json<JsonDocument>> {
    let id = parse_object_id(&id)?;
    state
        .service
        .get_document(&db, &collection, id)
        .await
        .map(Json)
}

async fn create_document(
    State(state): State<AppState>,
    Path((db, collection)): Path<(String, String)>,
    payload: std::result::Result<Json<Document>, JsonRejection>,
) -> Result<Json<Value>> {
    let document = body(payload)?;
    let id = state
        .service
        .create_document(&db, &collection, document)
        .await?;
    Ok(Json(json!({ "id": id })))
}

async fn update_document(
    State(state): State<AppState>,
    Path((db, collection, id)): Path<(String, String, String)>,
    payload: std::result::Result<Json<Document>, JsonRejection>,
) -> Result<Json<Value>> {
    let id = parse_object_id(&id)?;
    let document = body(payload)?;
    state
        .service
        .update_document(&db, &collection, id, document)
        .await?;
    Ok(message("Document updated successfully"))
}

async fn delete_document(
    State(state): State<AppState>,
    Path((db, collection, id)): Path<(String, String, String)>,
) -> Result<Json<Value>> {
    let id = parse_object_id(&id)?;
    state
        .service
        .delete_document(&db, &collection, id)
        .await?;
    Ok(message("Document deleted successfully"))
}
