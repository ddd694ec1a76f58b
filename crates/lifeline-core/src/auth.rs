//! Email/password accounts against an external identity provider.

use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{AUTH_KEY_ENV_VAR, Config};
use crate::datastore::DataStore;
use crate::notice::{ConfigurationError, Notice};
use crate::validation::{ValidationErrors, validate_credentials};

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthErrorCode {
    InvalidEmail,
    WrongPassword,
    UserNotFound,
    EmailInUse,
    WeakPassword,
    UserDisabled,
    InvalidCredential,
    OperationNotAllowed,
    TooManyRequests,
    Network,
    InvalidApiKey,
    ConfigurationNotFound,
    UnauthorizedDomain,
    Unknown(String),
}

impl AuthErrorCode {
    /// Maps a provider error string (`EMAIL_NOT_FOUND`,
    /// `auth/wrong-password`, ...) to a known code.
    pub fn from_provider(raw: &str) -> Self {
        let head = raw.split([':', ' ']).next().unwrap_or(raw).trim();
        let normalized = head
            .strip_prefix("auth/")
            .unwrap_or(head)
            .to_ascii_uppercase()
            .replace('-', "_");

        match normalized.as_str() {
            "INVALID_EMAIL" => AuthErrorCode::InvalidEmail,
            "INVALID_PASSWORD" | "WRONG_PASSWORD" => AuthErrorCode::WrongPassword,
            "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" => AuthErrorCode::UserNotFound,
            "EMAIL_EXISTS" | "EMAIL_ALREADY_IN_USE" => AuthErrorCode::EmailInUse,
            "WEAK_PASSWORD" => AuthErrorCode::WeakPassword,
            "USER_DISABLED" => AuthErrorCode::UserDisabled,
            "INVALID_LOGIN_CREDENTIALS" | "INVALID_CREDENTIAL" | "INVALID_ID_TOKEN"
            | "TOKEN_EXPIRED" | "USER_TOKEN_EXPIRED" | "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" => {
                AuthErrorCode::InvalidCredential
            }
            "OPERATION_NOT_ALLOWED" | "PASSWORD_LOGIN_DISABLED" => {
                AuthErrorCode::OperationNotAllowed
            }
            "TOO_MANY_ATTEMPTS_TRY_LATER" | "TOO_MANY_REQUESTS" => AuthErrorCode::TooManyRequests,
            "NETWORK_REQUEST_FAILED" => AuthErrorCode::Network,
            "API_KEY_INVALID" | "INVALID_API_KEY" | "API_KEY_NOT_VALID" => {
                AuthErrorCode::InvalidApiKey
            }
            "CONFIGURATION_NOT_FOUND" | "PROJECT_NOT_FOUND" => AuthErrorCode::ConfigurationNotFound,
            "UNAUTHORIZED_DOMAIN" => AuthErrorCode::UnauthorizedDomain,
            _ if raw.starts_with("API key not valid") => AuthErrorCode::InvalidApiKey,
            _ => AuthErrorCode::Unknown(raw.to_string()),
        }
    }

    /// User-facing title and message for this code.
    pub fn notice(&self) -> Notice {
        let (title, message) = match self {
            AuthErrorCode::InvalidEmail => (
                "Invalid email",
                "The email address is not valid. Please check it and try again.",
            ),
            AuthErrorCode::WrongPassword => (
                "Incorrect password",
                "The password you entered is incorrect. Please try again.",
            ),
            AuthErrorCode::UserNotFound => (
                "Account not found",
                "No account exists for this email. Check the address or sign up.",
            ),
            AuthErrorCode::EmailInUse => (
                "Email already registered",
                "An account with this email already exists. Try signing in instead.",
            ),
            AuthErrorCode::WeakPassword => (
                "Weak password",
                "The password is too weak. Use at least 6 characters.",
            ),
            AuthErrorCode::UserDisabled => (
                "Account disabled",
                "This account has been disabled. Contact support for help.",
            ),
            AuthErrorCode::InvalidCredential => (
                "Invalid credentials",
                "The email or password is incorrect, or your session has expired. \
                 Please sign in again.",
            ),
            AuthErrorCode::OperationNotAllowed => (
                "Sign-in method disabled",
                "Email/password sign-in is not enabled for this project.",
            ),
            AuthErrorCode::TooManyRequests => (
                "Too many attempts",
                "Access is temporarily blocked after repeated failures. Try again later.",
            ),
            AuthErrorCode::Network => (
                "Network error",
                "Could not reach the authentication service. Check your connection.",
            ),
            AuthErrorCode::InvalidApiKey
            | AuthErrorCode::ConfigurationNotFound
            | AuthErrorCode::UnauthorizedDomain => {
                return self.configuration_error().to_notice();
            }
            AuthErrorCode::Unknown(raw) => {
                return Notice::error(
                    "Authentication failed",
                    format!("An unexpected error occurred ({raw}). Please try again."),
                );
            }
        };
        Notice::error(title, message)
    }

    fn configuration_error(&self) -> ConfigurationError {
        match self {
            AuthErrorCode::ConfigurationNotFound => ConfigurationError::new(
                "Authentication is not set up",
                "The identity provider project has no email/password configuration.",
                &[
                    "Open the identity provider console for your project.",
                    "Enable the Email/Password sign-in provider.",
                    "Check that `auth.api_key` belongs to that project.",
                    "Try signing in again.",
                ],
            ),
            AuthErrorCode::UnauthorizedDomain => ConfigurationError::new(
                "Unauthorized domain",
                "The identity provider rejected requests from this client.",
                &[
                    "Open the identity provider console for your project.",
                    "Add this client to the authorized domains or API key restrictions.",
                    "Try signing in again.",
                ],
            ),
            _ => invalid_api_key(),
        }
    }
}

fn invalid_api_key() -> ConfigurationError {
    ConfigurationError::new(
        "Authentication configuration error",
        "The identity provider API key is missing or invalid.",
        &[
            "Copy the Web API key from your identity provider project settings.",
            "Add `auth.api_key = <key>` to ~/.lifelinerc, or export LIFELINE_AUTH_API_KEY.",
            "Make sure the key is not restricted from the Identity Toolkit API.",
            "Try signing in again.",
        ],
    )
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Invalid(#[from] ValidationErrors),

    #[error("{}", .0.notice())]
    Provider(AuthErrorCode),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("authentication request failed: {0:#}")]
    Transport(anyhow::Error),
}

impl AuthError {
    pub fn notice(&self) -> Notice {
        match self {
            AuthError::Invalid(errors) => Notice::error("Check your input", errors.to_string()),
            AuthError::Provider(code) => code.notice(),
            AuthError::Configuration(err) => err.to_notice(),
            AuthError::Transport(_) => AuthErrorCode::Network.notice(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn load(store: &DataStore) -> anyhow::Result<Option<Self>> {
        store.load_json(&store.session_path)
    }

    #[tracing::instrument(skip_all, fields(email = %self.email))]
    pub fn save(&self, store: &DataStore) -> anyhow::Result<()> {
        store.save_json(&store.session_path, self)
    }

    /// Signs out locally. Returns whether a session existed.
    pub fn clear(store: &DataStore) -> anyhow::Result<bool> {
        store.remove(&store.session_path)
    }
}

pub trait IdentityProvider {
    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session, AuthError>> + Send;

    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session, AuthError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountAction {
    SignIn,
    SignUp,
}

/// Validates the credentials, asks the provider and stores the resulting
/// session. Nothing is stored on failure.
#[tracing::instrument(skip(provider, store, password))]
pub async fn authenticate<P: IdentityProvider>(
    provider: &P,
    store: &DataStore,
    action: AccountAction,
    email: &str,
    password: &str,
) -> Result<Session, AuthError> {
    let email = email.trim();
    validate_credentials(email, password)?;

    let session = match action {
        AccountAction::SignIn => provider.sign_in(email, password).await?,
        AccountAction::SignUp => provider.sign_up(email, password).await?,
    };
    session.save(store).map_err(AuthError::Transport)?;
    Ok(session)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    local_id: String,
    email: String,
    id_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Identity Toolkit REST client (email/password accounts).
#[derive(Debug, Clone)]
pub struct IdentityToolkit {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl IdentityToolkit {
    pub fn new(base_url: &str, api_key: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed building HTTP client for authentication")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, AuthError> {
        let api_key = cfg
            .secret("auth.api_key", AUTH_KEY_ENV_VAR)
            .ok_or_else(invalid_api_key)?;
        let base_url = cfg
            .get("auth.endpoint")
            .unwrap_or_else(|| IDENTITY_TOOLKIT_URL.to_string());
        Self::new(&base_url, &api_key).map_err(AuthError::Transport)
    }

    #[tracing::instrument(skip(self, password))]
    async fn password_call(
        &self,
        action: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let url = format!("{}/accounts:{action}", self.base_url);
        let body = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|err| AuthError::Transport(err.into()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| AuthError::Transport(err.into()))?;

        if !status.is_success() {
            let code = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|envelope| AuthErrorCode::from_provider(&envelope.error.message))
                .unwrap_or_else(|_| AuthErrorCode::Unknown(format!("HTTP {status}")));
            warn!(status = %status, code = ?code, "identity provider rejected request");
            return Err(AuthError::Provider(code));
        }

        let token: TokenResponse = serde_json::from_str(&text)
            .map_err(|err| AuthError::Transport(anyhow::Error::new(err)))?;
        debug!(user_id = %token.local_id, "identity provider accepted credentials");
        Ok(session_from_token(token, Utc::now()))
    }
}

fn session_from_token(token: TokenResponse, now: DateTime<Utc>) -> Session {
    let lifetime = token
        .expires_in
        .as_deref()
        .and_then(|raw| raw.parse::<i64>().ok())
        .unwrap_or(3600);
    Session {
        user_id: token.local_id,
        email: token.email,
        id_token: token.id_token,
        refresh_token: token.refresh_token,
        expires_at: now + chrono::Duration::seconds(lifetime),
    }
}

impl IdentityProvider for IdentityToolkit {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let session = self.password_call("signInWithPassword", email, password).await?;
        info!(email = %session.email, "signed in");
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let session = self.password_call("signUp", email, password).await?;
        info!(email = %session.email, "account created");
        Ok(session)
    }
}
