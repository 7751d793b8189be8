use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use crate::http::server::AppState;

/// Admit admin requests carrying the configured bearer token. The key is read
/// per request so reloads take effect without restarting the server.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let admin = state.admin.load_full();
    match bearer_token(request.headers()) {
        Some(token) if !admin.api_key.is_empty() && token == admin.api_key => Ok(next.run(request).await),
        _ => {
            tracing::debug!(path = %request.uri().path(), "Admin request rejected");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, "Bearer secret".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("secret"));
    }
}
