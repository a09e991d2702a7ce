use crate::domain::result::DomainResult;

/// Identity of the authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: String,
}

/// Validates opaque identity tokens issued by the identity collaborator.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait IdentityProvider: Send + Sync {
    fn validate_token(&self, token: &str) -> DomainResult<CallerIdentity>;
}
