use actix_web::HttpResponse;
use serde_json::json;

/// Liveness probe. Deliberately outside the signed URL gate.
pub async fn status() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "message": "Server is running" }))
}
