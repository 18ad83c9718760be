use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use modelfilter_core::{execute_query, NewSavedQuery, QueryError, QueryResponse, SavedQueryPatch};
use modelfilter_storage::{
    fixture_items, load_items, InMemorySavedQueries, ItemCollection, LoadOrigin,
    SavedQueryStore, FIXTURE_SOURCE,
};
use prometheus::{Encoder, TextEncoder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod metrics;

use config::ServerConfig;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone)]
struct AppState {
    items: ItemCollection,
    saved: Arc<dyn SavedQueryStore>,
    config: Arc<ServerConfig>,
}

impl AppState {
    fn new(items: ItemCollection, config: ServerConfig) -> Self {
        Self {
            items,
            saved: Arc::new(InMemorySavedQueries::new()),
            config: Arc::new(config),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env();
    let items = ItemCollection::new();
    if let Some(path) = &config.items_path {
        match load_items(path) {
            Ok(loaded) => {
                items.replace(loaded, path.display().to_string());
            }
            Err(e) => warn!("initial load from {} failed: {}", path.display(), e),
        }
    }
    if items.is_empty() && config.use_test_data {
        items.replace(fixture_items(), FIXTURE_SOURCE);
    }
    metrics::ITEMS_LOADED.set(items.len() as f64);
    if items.is_empty() {
        info!("no items loaded yet; POST /api/init/setup to load a collection");
    }

    let addr = config.bind_addr;
    let app = app(AppState::new(items, config));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("http listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", e);
    }
    info!("shutting down");
}

fn app(state: AppState) -> Router {
    let max_body = state.config.max_body_bytes;
    let router = Router::new()
        .route("/health", get(health))
        .route("/api/status", get(status))
        .route("/api/query", post(run_query))
        .route("/api/query/categories", get(categories))
        .route("/api/query/saved", get(list_saved).post(create_saved))
        .route(
            "/api/query/saved/:id",
            get(get_saved).put(update_saved).delete(delete_saved),
        )
        .route("/api/init/setup", post(setup))
        .route("/metrics", get(metrics))
        .fallback(not_found)
        .with_state(state);
    with_layers(router, max_body)
}

fn with_layers(router: Router, max_body: usize) -> Router {
    router
        .layer(DefaultBodyLimit::max(max_body))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(AnyOrigin)
                .allow_methods(AnyOrigin)
                .allow_headers(AnyOrigin),
        )
        .layer(CatchPanicLayer::custom(panic_response))
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!(%detail, "request handler panicked");
    let body = QueryResponse::failure(QueryError::Internal(detail).to_string());
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// Failure body for every route except query execution.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        let status = match e {
            QueryError::NotFound(_) => StatusCode::NOT_FOUND,
            QueryError::Conflict(_) | QueryError::Invalid(_) | QueryError::MissingBody => {
                StatusCode::BAD_REQUEST
            }
            QueryError::DataNotReady => StatusCode::SERVICE_UNAVAILABLE,
            QueryError::Load(_) | QueryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({"success": false, "error": self.message})),
        )
            .into_response()
    }
}

/// Empty bodies read as JSON `null`.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        serde_json::from_value(JsonValue::Null)
    } else {
        serde_json::from_slice(body)
    }
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn status(State(app): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "message": "Filter API is running",
        "version": VERSION,
        "itemsLoaded": app.items.len(),
        "categories": app.items.catalog().len(),
        "source": app.items.source(),
    }))
}

async fn run_query(State(app): State<AppState>, body: Bytes) -> Response {
    let payload: JsonValue = match parse_body(&body) {
        Ok(v) => v,
        Err(e) => {
            metrics::QUERIES_TOTAL.with_label_values(&["rejected"]).inc();
            let resp = QueryResponse::failure(format!("invalid JSON body: {e}"));
            return (StatusCode::BAD_REQUEST, Json(resp)).into_response();
        }
    };

    let items = app.items.snapshot();
    let timer = metrics::QUERY_DURATION_SEC.start_timer();
    let result = execute_query(&items, &payload);
    timer.observe_duration();

    match &result {
        Ok(outcome) => {
            metrics::QUERIES_TOTAL.with_label_values(&["ok"]).inc();
            metrics::QUERY_MATCHES.observe(outcome.count as f64);
            for d in &outcome.diagnostics {
                metrics::DEGRADED_NODES_TOTAL
                    .with_label_values(&[d.kind.as_str()])
                    .inc();
            }
            info!(
                matched = outcome.count,
                scanned = outcome.stats.conditions_scanned,
                degraded = outcome.diagnostics.len(),
                "query executed"
            );
        }
        Err(e) => {
            metrics::QUERIES_TOTAL.with_label_values(&["failed"]).inc();
            warn!(error = %e, "query failed");
        }
    }
    (StatusCode::OK, Json(QueryResponse::from(result))).into_response()
}

async fn categories(State(app): State<AppState>) -> impl IntoResponse {
    let catalog = app.items.catalog();
    Json(json!({"success": true, "data": &*catalog}))
}

async fn list_saved(State(app): State<AppState>) -> Result<Json<JsonValue>, ApiError> {
    metrics::SAVED_QUERY_OPS_TOTAL.with_label_values(&["list"]).inc();
    let list = app.saved.list().await?;
    Ok(Json(json!({"success": true, "count": list.len(), "data": list})))
}

async fn create_saved(
    State(app): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    metrics::SAVED_QUERY_OPS_TOTAL.with_label_values(&["create"]).inc();
    let req: Option<NewSavedQuery> =
        parse_body(&body).map_err(|e| ApiError::bad_request(format!("invalid JSON body: {e}")))?;
    let req = req.ok_or_else(|| ApiError::bad_request("ID, name and query are required"))?;
    let saved = app.saved.insert(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({"success": true, "data": saved, "message": "Query saved successfully"})),
    ))
}

async fn get_saved(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    metrics::SAVED_QUERY_OPS_TOTAL.with_label_values(&["get"]).inc();
    let saved = app.saved.get(&id).await?;
    Ok(Json(json!({"success": true, "data": saved})))
}

async fn update_saved(
    State(app): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<JsonValue>, ApiError> {
    metrics::SAVED_QUERY_OPS_TOTAL.with_label_values(&["update"]).inc();
    let patch: Option<SavedQueryPatch> =
        parse_body(&body).map_err(|e| ApiError::bad_request(format!("invalid JSON body: {e}")))?;
    let saved = app.saved.update(&id, patch.unwrap_or_default()).await?;
    Ok(Json(json!({"success": true, "data": saved, "message": "Query updated successfully"})))
}

async fn delete_saved(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    metrics::SAVED_QUERY_OPS_TOTAL.with_label_values(&["delete"]).inc();
    app.saved.delete(&id).await?;
    Ok(Json(json!({"success": true, "message": "Query deleted successfully"})))
}

#[derive(Debug, Default, Deserialize)]
struct SetupRequest {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    fixture: bool,
}

async fn setup(State(app): State<AppState>, body: Bytes) -> Result<Json<JsonValue>, ApiError> {
    let req: Option<SetupRequest> =
        parse_body(&body).map_err(|e| ApiError::bad_request(format!("invalid JSON body: {e}")))?;
    let req = req.unwrap_or_default();

    let (loaded, source, origin) = match req.path.filter(|p| !p.trim().is_empty()) {
        Some(path) if !req.fixture => {
            info!("setting up model data from {}", path);
            let target = path.clone();
            let result = tokio::task::spawn_blocking(move || load_items(target))
                .await
                .map_err(|e| QueryError::Internal(e.to_string()))?;
            match result {
                Ok(loaded) => (loaded, path, LoadOrigin::File),
                Err(e) if e.is_not_found() => {
                    warn!("{} not found, falling back to test data", path);
                    (fixture_items(), FIXTURE_SOURCE.to_string(), LoadOrigin::Fallback)
                }
                Err(e) => return Err(QueryError::from(e).into()),
            }
        }
        _ if req.fixture || app.config.use_test_data => {
            (fixture_items(), FIXTURE_SOURCE.to_string(), LoadOrigin::TestData)
        }
        _ => return Err(ApiError::bad_request("Either `path` or `fixture` is required")),
    };

    let summary = app.items.replace(loaded, source);
    metrics::ITEMS_LOADED.set(summary.item_count as f64);
    Ok(Json(json!({
        "success": true,
        "message": summary.message(origin),
        "data": {
            "itemCount": summary.item_count,
            "categories": summary.categories,
            "source": summary.source,
            "usingFallback": origin == LoadOrigin::Fallback,
        }
    })))
}

async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buf) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buf,
    )
        .into_response()
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "Not Found", "message": format!("Route {} not found", uri)})),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use modelfilter_core::Item;
    use tower::ServiceExt;

    fn level_items() -> ItemCollection {
        ItemCollection::with_items(
            vec![
                Item::new("a").with_property("Constraints", "Level", "Level 1"),
                Item::new("b").with_property("Constraints", "Level", "Level 2"),
                Item::new("c")
                    .with_property("Constraints", "Level", "Level 1")
                    .with_property("Dimensions", "Area", "50"),
            ],
            "test",
        )
    }

    fn test_app(items: ItemCollection) -> Router {
        app(AppState::new(items, ServerConfig::default()))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<JsonValue>) -> (StatusCode, JsonValue) {
        let body = match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        };
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
        };
        (status, json)
    }

    #[tokio::test]
    async fn query_single_condition_shortcut() {
        let app = test_app(level_items());
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/query",
            Some(json!({"conditions": {"category": "Constraints", "field": "Level", "operator": "equals", "value": "Level 1"}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["dbIds"], json!(["a", "c"]));
        assert_eq!(body["count"], 2);
        assert_eq!(body["message"], "Query executed successfully");
    }

    #[tokio::test]
    async fn query_nested_and() {
        let app = test_app(level_items());
        let (_, body) = send(
            &app,
            Method::POST,
            "/api/query",
            Some(json!({"logic": "AND", "conditions": [
                {"category": "Constraints", "field": "Level", "operator": "equals", "value": "Level 1"},
                {"category": "Dimensions", "field": "Area", "operator": "greater_than", "value": "10"}
            ]})),
        )
        .await;
        assert_eq!(body["dbIds"], json!(["c"]));
        assert_eq!(body["count"], 1);
    }

    #[tokio::test]
    async fn query_empty_object_reports_diagnostic() {
        let app = test_app(level_items());
        let (status, body) = send(&app, Method::POST, "/api/query", Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["dbIds"], json!([]));
        assert_eq!(body["diagnostics"][0]["kind"], "malformed_node");
    }

    #[tokio::test]
    async fn query_without_data_fails() {
        let app = test_app(ItemCollection::new());
        let (status, body) = send(&app, Method::POST, "/api/query", Some(json!({"conditions": []}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["dbIds"], json!([]));
        assert_eq!(body["error"], "model data is empty or not initialized");
    }

    #[tokio::test]
    async fn query_without_body_fails() {
        let app = test_app(level_items());
        let (_, body) = send(&app, Method::POST, "/api/query", None).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "request body is missing or empty");
    }

    #[tokio::test]
    async fn categories_lists_fields() {
        let app = test_app(level_items());
        let (status, body) = send(&app, Method::GET, "/api/query/categories", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["data"],
            json!({"Constraints": ["Level"], "Dimensions": ["Area"]})
        );
    }

    #[tokio::test]
    async fn saved_query_lifecycle() {
        let app = test_app(level_items());
        let query = json!({"conditions": {"category": "Constraints", "field": "Level", "operator": "equals", "value": "Level 1"}});

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/query/saved",
            Some(json!({"id": "q1", "name": "Level one", "query": query})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["createdBy"], "anonymous");

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/query/saved",
            Some(json!({"id": "q2", "name": "Level one", "query": query})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/query/saved",
            Some(json!({"id": "q3", "name": "Missing query"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, Method::GET, "/api/query/saved/q1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["query"], query);

        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/query/saved/q1",
            Some(json!({"name": "Renamed"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Renamed");

        let (_, body) = send(&app, Method::GET, "/api/query/saved", None).await;
        assert_eq!(body["count"], 1);

        let (status, _) = send(&app, Method::DELETE, "/api/query/saved/q1", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&app, Method::GET, "/api/query/saved/q1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Query not found");
    }

    #[tokio::test]
    async fn setup_loads_fixture_then_queries_it() {
        let app = test_app(ItemCollection::new());
        let (status, body) = send(&app, Method::POST, "/api/init/setup", Some(json!({"fixture": true}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["itemCount"], 15);
        assert_eq!(body["data"]["usingFallback"], false);
        assert_eq!(body["message"], "Successfully loaded 15 test items with 2 categories");

        let (_, body) = send(
            &app,
            Method::POST,
            "/api/query",
            Some(json!({"conditions": {"category": "Dimensions", "field": "Area", "operator": "equals", "value": "20"}})),
        )
        .await;
        assert_eq!(body["dbIds"], json!(["ext-010", "ext-011"]));
    }

    #[tokio::test]
    async fn setup_loads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");
        std::fs::write(
            &path,
            json!([{"externalId": "x", "properties": {"Identity": {"Mark": "W1"}}}]).to_string(),
        )
        .unwrap();
        let app = test_app(ItemCollection::new());
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/init/setup",
            Some(json!({"path": path.display().to_string()})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["categories"], json!(["Identity"]));
        assert_eq!(body["data"]["usingFallback"], false);
        assert_eq!(body["message"], "Successfully loaded 1 items with 1 categories");
    }

    #[tokio::test]
    async fn setup_falls_back_to_test_data_when_file_is_missing() {
        let app = test_app(ItemCollection::new());
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/init/setup",
            Some(json!({"path": "/no/such/items.json"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["usingFallback"], true);
        assert_eq!(body["data"]["itemCount"], 15);
        assert_eq!(
            body["message"],
            "Fallback: Using test data with 15 items and 2 categories"
        );
    }

    #[tokio::test]
    async fn setup_requires_a_source() {
        let app = test_app(ItemCollection::new());
        let (status, body) = send(&app, Method::POST, "/api/init/setup", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");
        std::fs::write(&path, "{\"status\": \"ok\"}").unwrap();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/init/setup",
            Some(json!({"path": path.display().to_string()})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body["error"],
            "failed to load items: document holds no item collection"
        );
        let (_, status_body) = send(&app, Method::GET, "/api/status", None).await;
        assert_eq!(status_body["itemsLoaded"], 0);
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let app = test_app(level_items());
        let (status, body) = send(&app, Method::GET, "/api/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Route /api/nope not found");
    }

    async fn explode() -> &'static str {
        panic!("evaluation exploded")
    }

    #[tokio::test]
    async fn panics_become_failure_responses() {
        let app = with_layers(Router::new().route("/boom", get(explode)), 1024);
        let (status, body) = send(&app, Method::GET, "/boom", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["dbIds"], json!([]));
        assert_eq!(body["error"], "internal error: evaluation exploded");
    }

    #[tokio::test]
    async fn status_and_metrics_respond() {
        let app = test_app(level_items());
        let (status, body) = send(&app, Method::GET, "/api/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["itemsLoaded"], 3);
        assert_eq!(body["categories"], 2);
        assert_eq!(body["source"], "test");

        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
