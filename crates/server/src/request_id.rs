//! Request correlation middleware.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

/// Header carrying the request id in both directions.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longer client-provided ids are truncated to keep log lines bounded.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Request id for log correlation, stored in the request extensions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Reuse the client's `x-request-id` when it is usable, otherwise mint a UUID.
fn extract_or_generate(req: &Request) -> RequestId {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(sanitize)
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    RequestId(id)
}

/// Keep printable ASCII, truncated to [`MAX_REQUEST_ID_LEN`] characters.
fn sanitize(value: &str) -> String {
    value
        .chars()
        .take(MAX_REQUEST_ID_LEN)
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .collect()
}

/// Attach a [`RequestId`] to the request extensions and echo it on the response.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = extract_or_generate(&req);
    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id.0) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_id(value: &str) -> Request {
        Request::builder()
            .header(REQUEST_ID_HEADER, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn client_ids_are_sanitized() {
        assert_eq!(extract_or_generate(&request_with_id("abc-123")).0, "abc-123");
        assert_eq!(extract_or_generate(&request_with_id("a b\tc")).0, "a bc");

        let long = "x".repeat(300);
        assert_eq!(
            extract_or_generate(&request_with_id(&long)).0.len(),
            MAX_REQUEST_ID_LEN
        );
    }

    #[test]
    fn missing_or_unusable_id_is_generated() {
        let bare = Request::builder().body(Body::empty()).unwrap();
        assert!(Uuid::parse_str(&extract_or_generate(&bare).0).is_ok());

        let id = extract_or_generate(&request_with_id("\t\t"));
        assert!(Uuid::parse_str(&id.0).is_ok());
    }
}
