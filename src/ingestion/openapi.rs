//! OpenAPI / Swagger UI documentation for the ingestion gateway.
//!
//! - Swagger UI: `http://<bind>/docs`
//! - OpenAPI JSON: `http://<bind>/api-docs/openapi.json`

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Flash Sale Ingestion API",
        version = "1.0.0",
        description = "Admission, idempotency, and atomic reservation for flash-sale inventory.",
    ),
    paths(
        super::handlers::init,
        super::handlers::order,
    ),
    components(schemas(
        super::types::InitRequest,
        super::types::OrderRequest,
        super::types::OrderResponseData,
        super::types::ErrorResponse,
    )),
    tags(
        (name = "admin", description = "Administrative operations"),
        (name = "order", description = "The hot path"),
    )
)]
pub struct ApiDoc;
