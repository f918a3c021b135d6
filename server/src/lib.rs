use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use cardsearch::{search, Card, CatalogIndex, CatalogMetrics, IgnoredCardSource, SearchRequest, TagAssignment};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Serialize)]
pub struct SearchResponse {
    pub total_count: usize,
    pub took_s: f64,
    pub cards: Vec<Arc<Card>>,
}

#[derive(Serialize)]
pub struct TagUpdateResponse {
    pub card_id: String,
    pub assignments: usize,
}

/// Body of `PUT /admin/cards/:card_id/rating`; `null` clears the rating.
#[derive(Debug, Deserialize, Serialize)]
pub struct RatingUpdate {
    pub rating: Option<i32>,
}

/// Upper bound for `POST /admin/catalog` bodies unless configured otherwise.
pub const DEFAULT_CATALOG_BODY_LIMIT: usize = 512 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogIndex>,
    pub ignored: Arc<dyn IgnoredCardSource>,
    pub admin_token: Option<String>,
    /// Maximum accepted size in bytes of a catalog upload.
    pub catalog_body_limit: usize,
}

impl AppState {
    /// Admin token comes from `ADMIN_TOKEN`; without it the admin routes always refuse.
    pub fn new(catalog: Arc<CatalogIndex>, ignored: Arc<dyn IgnoredCardSource>) -> Self {
        let admin_token = std::env::var("ADMIN_TOKEN").ok().filter(|t| !t.is_empty());
        Self { catalog, ignored, admin_token, catalog_body_limit: DEFAULT_CATALOG_BODY_LIMIT }
    }
}

// CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
fn cors_layer() -> CorsLayer {
    let any = || CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                any()
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => any(),
    }
}

pub fn build_app(state: AppState) -> Router {
    let catalog_limit = DefaultBodyLimit::max(state.catalog_body_limit);
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status_handler))
        .route("/cards/search", post(search_handler))
        .route("/admin/catalog", post(rebuild_handler).layer(catalog_limit))
        .route("/admin/cards/:card_id/tags", put(tags_handler))
        .route("/admin/cards/:card_id/rating", put(rating_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
}

pub async fn status_handler(State(state): State<AppState>) -> Json<CatalogMetrics> {
    Json(state.catalog.metrics())
}

pub async fn search_handler(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let start = std::time::Instant::now();
    let page = search(&state.catalog, state.ignored.as_ref(), &request).map_err(|e| {
        tracing::error!(error = %format!("{e:#}"), "card search failed");
        (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
    })?;
    let elapsed = start.elapsed();
    Ok(Json(SearchResponse { total_count: page.total_count, took_s: elapsed.as_secs_f64(), cards: page.cards }))
}

async fn rebuild_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(cards): Json<Vec<Card>>,
) -> Result<Json<CatalogMetrics>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let catalog = Arc::clone(&state.catalog);
    let metrics = run_blocking(move || {
        catalog.rebuild(cards);
        catalog.metrics()
    })
    .await?;
    Ok(Json(metrics))
}

async fn tags_handler(
    State(state): State<AppState>,
    Path(card_id): Path<String>,
    headers: HeaderMap,
    Json(assignments): Json<Vec<TagAssignment>>,
) -> Result<Json<TagUpdateResponse>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let count = assignments.len();
    let catalog = Arc::clone(&state.catalog);
    let id = card_id.clone();
    let found = run_blocking(move || catalog.update_card_tag_assignments(&id, assignments)).await?;
    if !found {
        return Err((StatusCode::NOT_FOUND, format!("card {card_id} not found")));
    }
    Ok(Json(TagUpdateResponse { card_id, assignments: count }))
}

async fn rating_handler(
    State(state): State<AppState>,
    Path(card_id): Path<String>,
    headers: HeaderMap,
    Json(update): Json<RatingUpdate>,
) -> Result<Json<RatingUpdate>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let catalog = Arc::clone(&state.catalog);
    let id = card_id.clone();
    let rating = update.rating;
    if !run_blocking(move || catalog.update_card_rating(&id, rating)).await? {
        return Err((StatusCode::NOT_FOUND, format!("card {card_id} not found")));
    }
    Ok(Json(update))
}

// Catalog writes wait on the writer mutex, which a rebuild can hold for a long time.
async fn run_blocking<T, F>(f: F) -> Result<T, (StatusCode, String)>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("catalog task failed: {e}")))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
