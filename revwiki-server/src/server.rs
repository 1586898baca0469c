use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{
        rejection::FormRejection, ConnectInfo, DefaultBodyLimit, FromRequestParts, Path, Query,
        State,
    },
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Form, Json, Router,
};
use chrono::{DateTime, Utc};
use revwiki_cache::{CacheStats, RenderCache};
use revwiki_core::{
    Backend, FileBackend, Logged, MarkdownRenderer, MemoryBackend, RenderedBody, RevisionStore,
    StorageKind, Wiki,
};
use revwiki_types::{HistoryRow, Revision};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{config::ServerConfig, error::ApiError};

/// Route prefix of the rendered-document endpoint
pub const RENDER_ROUTE: &str = "/api/document/render/";

pub type AppWiki = Wiki<Logged<RevisionStore<Box<dyn Backend>>>, MarkdownRenderer>;

#[derive(Clone)]
pub struct AppState {
    pub wiki: Arc<AppWiki>,
}

impl AppState {
    pub fn new(wiki: AppWiki) -> Self {
        Self {
            wiki: Arc::new(wiki),
        }
    }
}

/// Build the wiki service described by `config`, loading persisted documents.
pub fn open_wiki(config: &ServerConfig) -> Result<AppWiki> {
    let backend: Box<dyn Backend> = match config.storage {
        StorageKind::Memory => Box::new(MemoryBackend),
        StorageKind::File => Box::new(
            FileBackend::open(&config.data_dir)
                .with_context(|| format!("opening data dir {}", config.data_dir.display()))?,
        ),
    };
    let store = RevisionStore::open(backend).context("loading revision store")?;

    let renderer = MarkdownRenderer::with_base_url(config.base_url.clone());
    let cache = match config.cache_capacity {
        Some(capacity) => RenderCache::with_max_entries(renderer, capacity),
        None => RenderCache::new(renderer),
    };

    Ok(Wiki::new(Logged::new(store), cache))
}

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/document/raw/{*name}", get(get_raw).post(post_raw))
        .route("/api/document/render/{*name}", get(get_rendered))
        .route("/api/document/history/{*name}", get(get_history))
        .route("/api/cache/stats", get(cache_stats))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: ServerConfig) -> Result<()> {
    let wiki = open_wiki(&config)?;
    info!(
        storage = ?config.storage,
        data_dir = %config.data_dir.display(),
        cache_capacity = ?config.cache_capacity,
        "wiki ready"
    );

    let app = router(AppState::new(wiki), config.max_body_bytes);

    info!(addr = %config.listen_addr, "revwiki-server listening");
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// Address of the peer that sent the request, or `unknown` when the
/// connection info is unavailable.
pub struct Contributor(pub String);

impl<S> FromRequestParts<S> for Contributor
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        Ok(Contributor(peer.unwrap_or_else(|| "unknown".to_string())))
    }
}

/// Wire form of a revision
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContentResponse {
    content_id: u64,
    content_body: String,
    comment: String,
    contributor: String,
    create_date_time: DateTime<Utc>,
}

impl ContentResponse {
    fn new(revision: &Revision, content_body: String) -> Self {
        Self {
            content_id: revision.id().as_u64(),
            content_body,
            comment: revision.comment().to_string(),
            contributor: revision.contributor().to_string(),
            create_date_time: revision.created_at(),
        }
    }
}

/// Wire form of one history row
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryResponse {
    revision_index: usize,
    comment: String,
    contributor: String,
    length_differ: i64,
    create_date_time: DateTime<Utc>,
}

impl From<HistoryRow> for HistoryResponse {
    fn from(row: HistoryRow) -> Self {
        Self {
            revision_index: row.revision_index,
            comment: row.comment,
            contributor: row.contributor,
            length_differ: row.length_delta,
            create_date_time: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RevQuery {
    rev: Option<i64>,
}

/// Post parameters, read from the form body or the query string
#[derive(Debug, Default, Deserialize)]
struct PostParams {
    #[serde(rename = "contentBody")]
    content_body: Option<String>,
    comment: Option<String>,
}

impl PostParams {
    /// Fields present here win over `fallback`
    fn or(self, fallback: PostParams) -> PostParams {
        PostParams {
            content_body: self.content_body.or(fallback.content_body),
            comment: self.comment.or(fallback.comment),
        }
    }
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn get_raw(
    Path(name): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<RevQuery>,
) -> Result<Json<ContentResponse>, ApiError> {
    let revision = state.wiki.fetch(&name, query.rev).ok_or(ApiError::NotFound)?;
    Ok(Json(ContentResponse::new(
        &revision,
        revision.body().to_string(),
    )))
}

async fn get_rendered(
    Path(name): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<RevQuery>,
) -> Result<Response, ApiError> {
    let wiki = Arc::clone(&state.wiki);
    let rendered = tokio::task::spawn_blocking(move || wiki.rendered(&name, query.rev))
        .await??
        .ok_or(ApiError::NotFound)?;

    let response = match rendered.body {
        RenderedBody::Html(html) => {
            Json(ContentResponse::new(&rendered.revision, html.to_string())).into_response()
        }
        RenderedBody::Redirect(target) => {
            let location = render_location(&target);
            (
                StatusCode::MOVED_PERMANENTLY,
                [(header::LOCATION, location)],
                Json(ContentResponse::new(&rendered.revision, target)),
            )
                .into_response()
        }
    };
    Ok(response)
}

async fn get_history(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<HistoryResponse>>, ApiError> {
    let rows = state.wiki.history(&name).ok_or(ApiError::NotFound)?;
    Ok(Json(rows.into_iter().map(HistoryResponse::from).collect()))
}

async fn post_raw(
    Path(name): Path<String>,
    State(state): State<AppState>,
    Contributor(contributor): Contributor,
    Query(query): Query<PostParams>,
    form: Result<Form<PostParams>, FormRejection>,
) -> Result<StatusCode, ApiError> {
    let (form, rejection) = match form {
        Ok(Form(form)) => (form, None),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return Err(ApiError::PayloadTooLarge);
        }
        // Without a form body the parameters may still come from the query.
        Err(rejection) => (PostParams::default(), Some(rejection)),
    };

    let params = form.or(query);
    let Some(content_body) = params.content_body else {
        return Err(ApiError::BadRequest(match rejection {
            Some(rejection) => rejection.body_text(),
            None => "missing contentBody".to_string(),
        }));
    };
    let comment = params.comment.unwrap_or_default();

    let wiki = Arc::clone(&state.wiki);
    tokio::task::spawn_blocking(move || {
        wiki.post_document(&name, &content_body, &comment, &contributor)
    })
    .await??;

    Ok(StatusCode::OK)
}

async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.wiki.cache().stats())
}

/// Render URL for a redirect target, path segments percent-encoded
fn render_location(target: &str) -> String {
    let (name, fragment) = match target.split_once('#') {
        Some((name, fragment)) => (name, Some(fragment)),
        None => (target, None),
    };

    let encoded: Vec<String> = name
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    let mut location = format!("{}{}", RENDER_ROUTE, encoded.join("/"));
    if let Some(fragment) = fragment {
        location.push('#');
        location.push_str(&urlencoding::encode(fragment));
    }
    location
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        let config = ServerConfig::default();
        let wiki = open_wiki(&config).unwrap();
        router(AppState::new(wiki), config.max_body_bytes)
    }

    fn post(uri: &str, form: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let response = app().oneshot(get("/healthz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn post_then_fetch_raw() {
        let app = app();

        let response = app
            .clone()
            .oneshot(post(
                "/api/document/raw/Front%20Page",
                "contentBody=hello+world&comment=first",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(get("/api/document/raw/Front%20Page"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["contentBody"], "hello world");
        assert_eq!(body["comment"], "first");
        assert_eq!(body["contributor"], "unknown");

        let response = app
            .oneshot(get("/api/document/raw/Front%20Page?rev=1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_documents_and_bad_revisions_are_not_found() {
        let app = app();
        app.clone()
            .oneshot(post("/api/document/raw/doc", "contentBody=x"))
            .await
            .unwrap();

        for uri in [
            "/api/document/raw/missing",
            "/api/document/raw/doc?rev=0",
            "/api/document/raw/doc?rev=-3",
            "/api/document/raw/doc?rev=2",
            "/api/document/render/missing",
            "/api/document/history/missing",
        ] {
            let response = app.clone().oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[tokio::test]
    async fn invalid_posts_are_bad_requests() {
        let app = app();

        let response = app
            .clone()
            .oneshot(post("/api/document/raw/doc", "comment=no+body"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let long_comment = "c".repeat(256);
        let response = app
            .clone()
            .oneshot(post(
                "/api/document/raw/doc",
                &format!("contentBody=x&comment={long_comment}"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.oneshot(get("/api/document/raw/doc")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn post_parameters_may_come_from_the_query_string() {
        let app = app();

        let request = Request::builder()
            .method("POST")
            .uri("/api/document/raw/doc?contentBody=hello&comment=c")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(app.clone().oneshot(get("/api/document/raw/doc")).await.unwrap()).await;
        assert_eq!(body["contentBody"], "hello");
        assert_eq!(body["comment"], "c");

        // Form fields win over the query string; missing ones fall back to it.
        let response = app
            .clone()
            .oneshot(post(
                "/api/document/raw/doc?contentBody=ignored&comment=from+query",
                "contentBody=from+form",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(app.oneshot(get("/api/document/raw/doc")).await.unwrap()).await;
        assert_eq!(body["contentBody"], "from form");
        assert_eq!(body["comment"], "from query");
    }

    #[tokio::test]
    async fn rendered_markdown() {
        let app = app();
        app.clone()
            .oneshot(post(
                "/api/document/raw/notes/today",
                "contentBody=Hello+**wiki**",
            ))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(get("/api/document/render/notes/today"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["contentBody"], "<p>Hello <strong>wiki</strong></p>\n");

        let stats = json(app.oneshot(get("/api/cache/stats")).await.unwrap()).await;
        assert_eq!(stats["misses"], 1);
        assert_eq!(stats["entries"], 1);
    }

    #[tokio::test]
    async fn redirects_answer_moved_permanently() {
        let app = app();
        app.clone()
            .oneshot(post(
                "/api/document/raw/alias",
                "contentBody=%23redirect+Main+Page%0Atrailing",
            ))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(get("/api/document/render/alias"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/api/document/render/Main%20Page"
        );
        let body = json(response).await;
        assert_eq!(body["contentBody"], "Main Page");

        let raw = json(app.oneshot(get("/api/document/raw/alias")).await.unwrap()).await;
        assert_eq!(raw["contentBody"], "#redirect Main Page");
    }

    #[tokio::test]
    async fn history_is_newest_first() {
        let app = app();
        for body in ["aaaaa", "aaaaaaaaa", "bbbbbbbbb", "cc"] {
            let response = app
                .clone()
                .oneshot(post(
                    "/api/document/raw/doc",
                    &format!("contentBody={body}"),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .oneshot(get("/api/document/history/doc"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let rows = json(response).await;
        let deltas: Vec<i64> = rows
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["lengthDiffer"].as_i64().unwrap())
            .collect();
        assert_eq!(deltas, vec![-7, 0, 4, 5]);
        assert_eq!(rows[0]["revisionIndex"], 4);
        assert!(rows[0]["createDateTime"].is_string());
        assert!(rows[0].get("lengthDelta").is_none());
    }

    #[test]
    fn render_location_encodes_segments() {
        assert_eq!(render_location("Main"), "/api/document/render/Main");
        assert_eq!(
            render_location("a b/c#Some Section"),
            "/api/document/render/a%20b/c#Some%20Section"
        );
        assert_eq!(
            render_location("대상"),
            "/api/document/render/%EB%8C%80%EC%83%81"
        );
    }
}
