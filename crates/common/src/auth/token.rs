//! Locating the caller's token in request headers.

/// Name of the cookie the browser client stores the token in
pub const TOKEN_COOKIE: &str = "jwt";

/// Pull a bearer token out of an `Authorization` header value.
pub fn bearer_token(authorization: &str) -> Option<&str> {
    let token = authorization.strip_prefix("Bearer")?.trim();
    (!token.is_empty()).then_some(token)
}

/// Pull the token cookie out of a `Cookie` header value.
pub fn cookie_token(cookie_header: &str) -> Option<&str> {
    cookie_header
        .split(';')
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, _)| *name == TOKEN_COOKIE)
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic xyz"), None);
    }

    #[test]
    fn test_cookie_token() {
        assert_eq!(cookie_token("theme=dark; jwt=abc.def"), Some("abc.def"));
        assert_eq!(cookie_token("jwt=\"quoted\""), Some("quoted"));
        assert_eq!(cookie_token("theme=dark"), None);
        assert_eq!(cookie_token("jwt="), None);
    }
}
