use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::TokenResponse;

/// Issues and checks opaque access tokens.
///
/// Tokens are random UUIDs held in memory with their expiry. Expired tokens
/// are purged when observed and whenever a new token is issued.
pub struct AuthService {
    app_key: String,
    /// None = token authentication disabled
    app_secret: Option<String>,
    ttl: Duration,
    tokens: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl AuthService {
    pub fn new(app_key: impl Into<String>, app_secret: Option<String>, ttl: Duration) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret,
            ttl,
            tokens: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.app_key.clone(), config.app_secret.clone(), config.token_ttl)
    }

    /// Whether `/api/v1` requires a token.
    pub fn is_enabled(&self) -> bool {
        self.app_secret.is_some()
    }

    /// Exchange app credentials for a token.
    ///
    /// # Errors
    ///
    /// `AppError::Unauthorized` when the credentials do not match, or when no
    /// secret is configured.
    #[instrument(skip_all)]
    pub async fn issue(&self, app_key: &str, app_secret: &str) -> AppResult<TokenResponse> {
        let Some(expected_secret) = &self.app_secret else {
            return Err(AppError::Unauthorized(
                "token authentication is disabled".to_string(),
            ));
        };

        // Evaluate both comparisons so timing does not reveal which one failed.
        let key_ok = constant_time_eq(app_key, &self.app_key);
        let secret_ok = constant_time_eq(app_secret, expected_secret);
        if !(key_ok & secret_ok) {
            warn!("Rejected app credentials");
            return Err(AppError::Unauthorized("app key or secret mismatch".to_string()));
        }

        let now = Utc::now();
        let expires_at = now
            + chrono::Duration::from_std(self.ttl)
                .map_err(|e| AppError::Internal(format!("token ttl out of range: {e}")))?;
        let token = Uuid::new_v4().simple().to_string();

        let mut tokens = self.tokens.write().await;
        tokens.retain(|_, expiry| *expiry > now);
        tokens.insert(token.clone(), expires_at);

        info!(live_tokens = tokens.len(), "Access token issued");

        Ok(TokenResponse { token, expires_at })
    }

    /// Check a token presented on a protected request.
    ///
    /// # Errors
    ///
    /// `AppError::InvalidToken` for a missing or unknown token,
    /// `AppError::TokenExpired` once its lifetime is over.
    pub async fn verify(&self, token: Option<&str>) -> AppResult<()> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::InvalidToken("missing token".to_string()))?;

        let expiry = self.tokens.read().await.get(token).copied();

        match expiry {
            Some(expires_at) if Utc::now() < expires_at => Ok(()),
            Some(_) => {
                self.tokens.write().await.remove(token);
                debug!("Expired token purged");
                Err(AppError::TokenExpired)
            }
            None => Err(AppError::InvalidToken("unknown token".to_string())),
        }
    }
}

/// Constant-time string comparison.
fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn service(ttl: Duration) -> AuthService {
        AuthService::new("blog-service", Some("s3cret".to_string()), ttl)
    }

    #[tokio::test]
    async fn test_issue_and_verify() {
        let auth = service(Duration::from_secs(60));
        let issued = auth.issue("blog-service", "s3cret").await.unwrap();

        assert!(issued.expires_at > Utc::now());
        assert!(auth.verify(Some(&issued.token)).await.is_ok());
    }

    #[tokio::test]
    async fn test_wrong_credentials_rejected() {
        let auth = service(Duration::from_secs(60));

        let err = auth.issue("blog-service", "guess").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let err = auth.issue("other", "s3cret").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_missing_and_unknown_tokens() {
        let auth = service(Duration::from_secs(60));

        assert!(matches!(
            auth.verify(None).await,
            Err(AppError::InvalidToken(_))
        ));
        assert!(matches!(
            auth.verify(Some("")).await,
            Err(AppError::InvalidToken(_))
        ));
        assert!(matches!(
            auth.verify(Some("not-a-token")).await,
            Err(AppError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_token_is_purged() {
        let auth = service(Duration::ZERO);
        let issued = auth.issue("blog-service", "s3cret").await.unwrap();

        assert!(matches!(
            auth.verify(Some(&issued.token)).await,
            Err(AppError::TokenExpired)
        ));
        // Second look: already purged, so it is simply unknown
        assert!(matches!(
            auth.verify(Some(&issued.token)).await,
            Err(AppError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn test_issue_fails_when_disabled() {
        let auth = AuthService::new("blog-service", None, Duration::from_secs(60));
        assert!(!auth.is_enabled());
        assert!(auth.issue("blog-service", "").await.is_err());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("secret123", "secret123"));
        assert!(!constant_time_eq("secret123", "secret456"));
        assert!(!constant_time_eq("short", "much-longer-string"));
    }
}
