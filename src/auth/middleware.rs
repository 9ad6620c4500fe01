// Signed URL gate for protected routes
use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use log::{debug, error};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::error::ApiError;

/// Token parameters carried in the query string
#[derive(Debug, Default, Deserialize)]
pub struct SignatureParams {
    pub expires: Option<String>,
    pub signature: Option<String>,
}

/// Proof that the request carried a valid token for its method and filename.
///
/// Put it first in a handler's arguments so the gate runs before the body
/// is touched. Routes without a `{filename}` segment are checked against
/// the empty filename.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub filename: String,
    pub expires: i64,
}

impl FromRequest for SignedRequest {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authorize(req, chrono::Utc::now().timestamp()))
    }
}

/// Validate `req` against the shared secret at time `now`.
pub fn authorize(req: &HttpRequest, now: i64) -> Result<SignedRequest, ApiError> {
    let state = req.app_data::<web::Data<AppState>>().ok_or_else(|| {
        error!("AppState missing from application data");
        ApiError::Internal("Server misconfigured.")
    })?;

    let filename = req.match_info().get("filename").unwrap_or("").to_string();
    let params = web::Query::<SignatureParams>::from_query(req.query_string())
        .map(web::Query::into_inner)
        .unwrap_or_default();
    let method = req.method().as_str();

    match state.signer.verify(
        method,
        &filename,
        params.expires.as_deref(),
        params.signature.as_deref(),
        now,
    ) {
        Ok(expires) => {
            debug!("Signed URL accepted: {} {:?}", method, filename);
            Ok(SignedRequest { filename, expires })
        }
        Err(reason) => {
            debug!("Signed URL rejected: {} {:?}: {}", method, filename, reason);
            Err(ApiError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;

    const NOW: i64 = 1_700_000_000;

    fn state() -> web::Data<AppState> {
        web::Data::new(AppState::new_for_testing("s3cr3t").unwrap())
    }

    fn request(method: actix_web::http::Method, uri: &str, filename: Option<&str>) -> HttpRequest {
        let mut req = test::TestRequest::default()
            .method(method)
            .uri(uri)
            .app_data(state());
        if let Some(name) = filename {
            req = req.param("filename", name.to_string());
        }
        req.to_http_request()
    }

    #[actix_web::test]
    async fn test_accepts_matching_token() {
        let s = state();
        let query = s.signer.signed_query("GET", "a.jpg", NOW + 5);
        let req = request(
            actix_web::http::Method::GET,
            &format!("/images/a.jpg?{}", query),
            Some("a.jpg"),
        );
        let signed = authorize(&req, NOW).unwrap();
        assert_eq!(signed.filename, "a.jpg");
        assert_eq!(signed.expires, NOW + 5);
    }

    #[actix_web::test]
    async fn test_upload_route_signs_empty_filename() {
        let s = state();
        let query = s.signer.signed_query("POST", "", NOW);
        let req = request(actix_web::http::Method::POST, &format!("/images?{}", query), None);
        let signed = authorize(&req, NOW).unwrap();
        assert_eq!(signed.filename, "");
    }

    #[actix_web::test]
    async fn test_rejects_wrong_method_and_missing_params() {
        let s = state();
        let query = s.signer.signed_query("GET", "a.jpg", NOW + 5);
        let req = request(
            actix_web::http::Method::DELETE,
            &format!("/images/a.jpg?{}", query),
            Some("a.jpg"),
        );
        assert!(matches!(authorize(&req, NOW), Err(ApiError::Forbidden)));

        let req = request(actix_web::http::Method::GET, "/images/a.jpg", Some("a.jpg"));
        assert!(matches!(authorize(&req, NOW), Err(ApiError::Forbidden)));

        let req = request(
            actix_web::http::Method::GET,
            "/images/a.jpg?expires=abc&signature=00",
            Some("a.jpg"),
        );
        assert!(matches!(authorize(&req, NOW), Err(ApiError::Forbidden)));
    }

    #[actix_web::test]
    async fn test_rejects_after_expiry() {
        let s = state();
        let query = s.signer.signed_query("GET", "a.jpg", NOW);
        let req = request(
            actix_web::http::Method::GET,
            &format!("/images/a.jpg?{}", query),
            Some("a.jpg"),
        );
        assert!(authorize(&req, NOW).is_ok());
        assert!(matches!(authorize(&req, NOW + 1), Err(ApiError::Forbidden)));
    }

    #[actix_web::test]
    async fn test_missing_state_is_internal_error() {
        let req = test::TestRequest::get().uri("/images/a.jpg").to_http_request();
        assert!(matches!(authorize(&req, NOW), Err(ApiError::Internal(_))));
    }
}
