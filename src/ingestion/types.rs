use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of `POST /init` (spec §4.1 `init`): `{"productId": ..., "quantity": ...}`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitRequest {
    #[schema(example = "iphone-15")]
    pub product_id: String,
    #[schema(example = 100)]
    pub quantity: i64,
}

/// Body of `POST /order` (spec §4.1 `order`): `{"productId": ..., "userId": ...}`.
/// The idempotency token travels as a header (`x-idempotency-key`, spec §8
/// scenario 6), not a body field, so it is extracted separately in the
/// handler.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    #[schema(example = "iphone-15")]
    pub product_id: String,
    #[schema(example = "alice")]
    pub user_id: String,
}

/// `{"status": "success" | "ignored" | "sold_out", "msg": ..., "reservationId"?: ...}`
/// body shared by every terminal outcome of the hot path (spec §6's
/// response bodies).
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponseData {
    pub status: &'static str,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "4b8f1c1a-9e3e-4c3a-9b1a-1e6a9d6a1f2a")]
    pub reservation_id: Option<String>,
}

/// Top-level `{"error": ...}` body for malformed requests (spec §6/§7's
/// bad-request shape).
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}
