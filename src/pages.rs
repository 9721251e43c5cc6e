//! Server-rendered pages for the read-only views.

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use std::fmt::Write;

use crate::document::PageWindow;
use crate::error::ConsoleError;
use crate::http::{AppState, PageParams};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/connections", get(connections_page))
        .route("/database/:db", get(database_page))
        .route("/database/:db/collection/:collection", get(collection_page))
}

/// Failures render as an HTML error page instead of JSON.
struct PageError(ConsoleError);

impl From<ConsoleError> for PageError {
    fn from(err: ConsoleError) -> Self {
        Self(err)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        tracing::warn!("Page request failed: {}", self.0);
        let body = format!(
            "<p class=\"error\">{}</p><p><a href=\"/\">Back</a></p>",
            escape(&self.0.to_string())
        );
        (status, layout("Error", &body)).into_response()
    }
}

type PageResult = std::result::Result<Html<String>, PageError>;

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn segment(text: &str) -> String {
    urlencoding::encode(text).into_owned()
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title} - MongoDB Console</title></head>\n\
         <body>\n<nav><a href=\"/\">Databases</a> | <a href=\"/connections\">Connections</a></nav>\n\
         <h1>{title}</h1>\n{body}\n</body>\n</html>\n",
        title = escape(title),
    ))
}

async fn index(State(state): State<AppState>) -> PageResult {
    let databases = state.service.list_databases().await?;

    let mut body = String::new();
    match state.store.current() {
        Some(current) => {
            let _ = writeln!(
                body,
                "<p>Connected to <strong>{}</strong> ({}:{})</p>",
                escape(&current.name),
                escape(&current.host),
                current.port
            );
        }
        None => body.push_str("<p>No current connection</p>\n"),
    }

    body.push_str("<ul>\n");
    for db in &databases {
        let _ = writeln!(
            body,
            "<li><a href=\"/database/{}\">{}</a></li>",
            segment(db),
            escape(db)
        );
    }
    body.push_str("</ul>");

    Ok(layout("Databases", &body))
}

async fn connections_page(State(state): State<AppState>) -> PageResult {
    let current_id = state.store.current_id();

    let mut body = String::from(
        "<table>\n<tr><th></th><th>Name</th><th>Host</th><th>Database</th><th>Description</th></tr>\n",
    );
    for profile in state.store.list() {
        let marker = if current_id.as_deref() == Some(profile.id.as_str()) {
            "current"
        } else {
            ""
        };
        let _ = writeln!(
            body,
            "<tr><td>{marker}</td><td>{}</td><td>{}:{}</td><td>{}</td><td>{}</td></tr>",
            escape(&profile.name),
            escape(&profile.host),
            profile.port,
            escape(&profile.database),
            escape(profile.description.as_deref().unwrap_or_default()),
        );
    }
    body.push_str("</table>");

    Ok(layout("Connections", &body))
}

async fn database_page(State(state): State<AppState>, Path(db): Path<String>) -> PageResult {
    let info = state.service.get_database(&db).await?;
    let stats = &info.stats;

    let mut body = format!(
        "<p>{} collections, {} objects, data {} bytes, storage {} bytes, {} indexes ({} bytes)</p>\n<ul>\n",
        stats.collections,
        stats.objects,
        stats.data_size,
        stats.storage_size,
        stats.indexes,
        stats.index_size
    );
    for collection in &info.collections {
        let _ = writeln!(
            body,
            "<li><a href=\"/database/{}/collection/{}\">{}</a></li>",
            segment(&info.name),
            segment(collection),
            escape(collection)
        );
    }
    body.push_str("</ul>");

    Ok(layout(&info.name, &body))
}

async fn collection_page(
    State(state): State<AppState>,
    Path((db, collection)): Path<(String, String)>,
    Query(params): Query<PageParams>,
) -> PageResult {
    let pagination = params.pagination();
    let page = state
        .service
        .list_documents(&db, &collection, pagination)
        .await?;
    let window = PageWindow::new(page.total, pagination);

    let mut body = format!(
        "<p>Showing {}-{} of {} documents</p>\n",
        window.start.min(page.total),
        window.end,
        page.total
    );
    for document in &page.documents {
        let pretty = serde_json::to_string_pretty(document).unwrap_or_default();
        let _ = writeln!(body, "<pre>{}</pre>", escape(&pretty));
    }

    let base = format!("/database/{}/collection/{}", segment(&db), segment(&collection));
    body.push_str("<nav class=\"pages\">");
    for number in &window.page_numbers {
        if *number == page.page {
            let _ = write!(body, " <strong>{number}</strong>");
        } else {
            let _ = write!(
                body,
                " <a href=\"{base}?page={number}&amp;limit={}\">{number}</a>",
                page.limit
            );
        }
    }
    let _ = write!(body, " of {}</nav>", window.total_pages);

    Ok(layout(&format!("{db}.{collection}"), &body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::{KNOWN_ID, harness, send_raw};

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[tokio::test]
    async fn test_index_shows_current_connection() {
        let h = harness(true);
        let (status, html) = send_raw(&h.state, "GET", "/", None).await;

        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("Connected to <strong>Local MongoDB</strong> (localhost:27017)"));
        assert!(html.contains("<a href=\"/database/shop\">shop</a>"));
    }

    #[tokio::test]
    async fn test_connections_page_marks_current() {
        let h = harness(true);
        let (status, html) = send_raw(&h.state, "GET", "/connections", None).await;

        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("<td>current</td><td>Local MongoDB</td>"));
    }

    #[tokio::test]
    async fn test_collection_page_paginates_and_escapes() {
        let h = harness(true);
        let (status, html) = send_raw(
            &h.state,
            "GET",
            "/database/shop/collection/orders?page=2&limit=10",
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("Showing 11-20 of 41 documents"));
        assert!(html.contains(KNOWN_ID));
        assert!(html.contains("&lt;b&gt;lamp&lt;/b&gt;"));
        assert!(html.contains("<strong>2</strong>"));
        assert!(html.contains("?page=4&amp;limit=10\">4</a>"));
        assert!(html.contains(" of 5</nav>"));
    }

    #[tokio::test]
    async fn test_database_page_error_renders_html() {
        let h = harness(true);
        let (status, html) = send_raw(&h.state, "GET", "/database/missing", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(html.contains("database &#39;missing&#39; not found"));
    }
}
