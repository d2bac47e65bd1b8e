use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use roost_core::crawl::CrawlOptions;
use roost_core::source::SourceConfig;
use roost_core::traits::{ListingBackend, SourceBackend};

use crate::auth::require_api_key;
use crate::dto::{
    CrawlRequest, CrawlResponse, ErrorResponse, HealthResponse, JobListResponse, JobResponse,
    ListJobsQuery, ListListingsQuery, ListSourcesQuery, ListingListResponse, ListingResponse,
    ScheduleAllResponse, ScheduledResponse, SourceHealthResponse, SourceListResponse,
    SourceResponse,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/v1/sources/{id}/crawl", post(crawl_source))
        .route("/v1/crawls", post(schedule_all))
        .route("/v1/jobs", get(list_jobs))
        .route("/v1/jobs/{id}", get(get_job))
        .route("/v1/sources", get(list_sources))
        .route("/v1/sources", post(upsert_source))
        .route("/v1/sources/health", get(sources_health))
        .route("/v1/listings", get(list_listings))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    let public = Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(api).with_state(state)
}

// ---------------------------------------------------------------------------
// Crawls
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/sources/{id}/crawl",
    params(
        ("id" = String, Path, description = "Source ID")
    ),
    request_body = CrawlRequest,
    responses(
        (status = 200, description = "Crawl result (sync)", body = CrawlResponse),
        (status = 202, description = "Crawl scheduled (async)", body = ScheduledResponse),
        (status = 404, description = "Unknown source", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "crawls"
)]
pub async fn crawl_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    axum::Json(body): axum::Json<CrawlRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let options = CrawlOptions {
        max_pages: body.max_pages,
        max_listings: body.max_listings,
        dry_run: body.dry_run,
    };

    if body.run_async {
        // Validate the source id up front so a typo is a 404, not a
        // failed job discovered later.
        let source = state
            .registry
            .get_source(&id)
            .await?
            .ok_or_else(|| roost_core::AppError::SourceNotFound(id.clone()))?;

        let priority = body.priority.unwrap_or(source.priority);
        let job_id = state.scheduler.schedule_crawl(&id, priority, options)?;
        let response = ScheduledResponse {
            job_id,
            status: "scheduled",
        };
        return Ok((StatusCode::ACCEPTED, axum::Json(response)).into_response());
    }

    let result = state.runner.run_crawl(&id, &options).await?;
    Ok(axum::Json(CrawlResponse::from(result)).into_response())
}

#[utoipa::path(
    post,
    path = "/v1/crawls",
    responses(
        (status = 202, description = "Crawls scheduled for all enabled sources", body = ScheduleAllResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "crawls"
)]
pub async fn schedule_all(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let sources = state.registry.list_sources(true).await?;
    let (scheduled, job_ids) = state.scheduler.schedule_all_crawls(&sources);

    let response = ScheduleAllResponse {
        scheduled,
        job_ids,
    };
    Ok((StatusCode::ACCEPTED, axum::Json(response)))
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/jobs",
    params(ListJobsQuery),
    responses(
        (status = 200, description = "List of crawl jobs", body = JobListResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "jobs"
)]
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListJobsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let state_filter = query
        .state
        .map(|s| {
            s.parse()
                .map_err(|e: String| roost_core::AppError::Generic(e))
        })
        .transpose()?;

    let limit = query.limit.unwrap_or(20).min(100);
    let jobs = state.scheduler.list_jobs(state_filter, limit);
    let total = jobs.len();

    let response = JobListResponse {
        jobs: jobs.into_iter().map(JobResponse::from).collect(),
        total,
    };

    Ok(axum::Json(response))
}

#[utoipa::path(
    get,
    path = "/v1/jobs/{id}",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job details", body = JobResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "jobs"
)]
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    match state.scheduler.get_job(id) {
        Some(job) => Ok(axum::Json(JobResponse::from(job)).into_response()),
        None => {
            let body = ErrorResponse {
                error: "not_found".to_string(),
                message: format!("Job not found: {id}"),
            };
            Ok((StatusCode::NOT_FOUND, axum::Json(body)).into_response())
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/sources",
    params(ListSourcesQuery),
    responses(
        (status = 200, description = "Registered sources by priority", body = SourceListResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "sources"
)]
pub async fn list_sources(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListSourcesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let sources = state
        .registry
        .list_sources(query.enabled_only.unwrap_or(false))
        .await?;
    let total = sources.len();

    let response = SourceListResponse {
        sources: sources.into_iter().map(SourceResponse::from).collect(),
        total,
    };

    Ok(axum::Json(response))
}

#[utoipa::path(
    post,
    path = "/v1/sources",
    request_body = Object,
    responses(
        (status = 201, description = "Source created or updated", body = SourceResponse),
        (status = 400, description = "Invalid source definition", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "sources"
)]
pub async fn upsert_source(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let config: SourceConfig =
        serde_json::from_value(body).map_err(roost_core::AppError::SerializationError)?;

    state.db.source_repo().upsert_source(&config).await?;

    Ok((
        StatusCode::CREATED,
        axum::Json(SourceResponse::from(config)),
    ))
}

#[utoipa::path(
    get,
    path = "/v1/sources/health",
    responses(
        (status = 200, description = "Health classification per source", body = [SourceHealthResponse]),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "sources"
)]
pub async fn sources_health(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.registry.health_report().await?;
    let response: Vec<SourceHealthResponse> =
        report.into_iter().map(SourceHealthResponse::from).collect();
    Ok(axum::Json(response))
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/listings",
    params(ListListingsQuery),
    responses(
        (status = 200, description = "Canonical listings, newest first", body = ListingListResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "listings"
)]
pub async fn list_listings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListListingsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.unwrap_or(50).min(500);
    let listings = state.db.listing_repo().list_canonical(limit).await?;
    let total = listings.len();

    let response = ListingListResponse {
        listings: listings.into_iter().map(ListingResponse::from).collect(),
        total,
    };

    Ok(axum::Json(response))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db_status = match state.db.listing_repo().health_check().await {
        Ok(()) => "ok",
        Err(_) => "error",
    };

    let status = if db_status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if db_status == "ok" {
            "healthy"
        } else {
            "unhealthy"
        },
        database: db_status,
    };

    (status, axum::Json(response))
}
