use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Roost API",
        version = "0.2.0",
        description = "Rental-listing ingestion: crawl triggering, job status, source health."
    ),
    paths(
        crate::routes::crawl_source,
        crate::routes::schedule_all,
        crate::routes::list_jobs,
        crate::routes::get_job,
        crate::routes::list_sources,
        crate::routes::upsert_source,
        crate::routes::sources_health,
        crate::routes::list_listings,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::CrawlRequest,
        crate::dto::CrawlResponse,
        crate::dto::ScheduledResponse,
        crate::dto::ScheduleAllResponse,
        crate::dto::JobResponse,
        crate::dto::JobListResponse,
        crate::dto::SourceResponse,
        crate::dto::SourceListResponse,
        crate::dto::SourceHealthResponse,
        crate::dto::ListingResponse,
        crate::dto::ListingListResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "crawls", description = "Trigger and schedule crawls"),
        (name = "jobs", description = "Crawl job status"),
        (name = "sources", description = "Source registry and health"),
        (name = "listings", description = "Canonical listing queries"),
        (name = "system", description = "Health and system status"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds Bearer token security scheme to the OpenAPI spec.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("token")
                        .description(Some(
                            "API key. Set via ROOST_SERVER_API_KEY environment variable.",
                        ))
                        .build(),
                ),
            );
        }
    }
}
