use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use common::auth::{bearer_token, cookie_token};
use common::domain::{CallerIdentity, DomainError, IdentityProvider};
use std::sync::Arc;

use super::ApiError;

/// State that can validate caller tokens
pub trait HasIdentityProvider: Send + Sync {
    fn identity_provider(&self) -> Arc<dyn IdentityProvider>;
}

/// Extractor for the authenticated caller.
///
/// Reads `Authorization: Bearer <token>`, falling back to the `jwt` cookie.
/// Rejects with 401 when neither is present or the token does not validate.
#[derive(Debug, Clone)]
pub struct Authenticated(pub CallerIdentity);

impl<S> FromRequestParts<S> for Authenticated
where
    S: HasIdentityProvider,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts).ok_or(DomainError::MissingToken)?;
        let identity = state.identity_provider().validate_token(token)?;
        Ok(Authenticated(identity))
    }
}

fn extract_token(parts: &Parts) -> Option<&str> {
    let from_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token);

    from_header.or_else(|| {
        parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(cookie_token)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_header_wins_over_cookie() {
        let parts = parts(&[("authorization", "Bearer header-token"), ("cookie", "jwt=cookie-token")]);
        assert_eq!(extract_token(&parts), Some("header-token"));
    }

    #[test]
    fn test_cookie_fallback() {
        let parts = parts(&[("cookie", "theme=dark; jwt=cookie-token")]);
        assert_eq!(extract_token(&parts), Some("cookie-token"));
    }

    #[test]
    fn test_no_token() {
        let parts = parts(&[("authorization", "Basic abc")]);
        assert_eq!(extract_token(&parts), None);
    }
}
