use crate::auth::JwtConfig;
use crate::domain::{CallerIdentity, DomainError, DomainResult, IdentityProvider};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by identity tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Caller id. Tokens minted by the legacy user service call this `user_id`.
    #[serde(alias = "user_id")]
    pub sub: String,
    pub exp: usize,
    #[serde(default)]
    pub iat: usize,
}

/// HS256 JWT implementation of the identity collaborator
pub struct JwtIdentityProvider {
    config: JwtConfig,
}

impl JwtIdentityProvider {
    pub fn new(config: JwtConfig) -> Self {
        Self { config }
    }

    /// Mint a token for `user_id`. Used by tooling and tests; login lives elsewhere.
    pub fn issue_token(&self, user_id: &str) -> DomainResult<String> {
        let now = chrono::Utc::now();
        let exp = now + chrono::Duration::hours(self.config.expiration_hours as i64);

        let claims = JwtClaims {
            sub: user_id.to_string(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.secret.as_bytes()),
        )
        .map_err(|e| DomainError::RepositoryError(anyhow::anyhow!("JWT encoding error: {}", e)))
    }
}

impl IdentityProvider for JwtIdentityProvider {
    fn validate_token(&self, token: &str) -> DomainResult<CallerIdentity> {
        let token_data = decode::<JwtClaims>(
            token,
            &DecodingKey::from_secret(self.config.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| DomainError::InvalidToken(e.to_string()))?;

        Ok(CallerIdentity {
            user_id: token_data.claims.sub,
        })
    }
}
