//! OAuth2 credential management for the Gmail API
//!
//! The credential lives in an authorized-user JSON file. On each run it is
//! reused while valid, refreshed once when expired, and otherwise re-obtained
//! through the installed-app consent flow in the browser.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use google_gmail1::{hyper_rustls, hyper_util, Gmail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use yup_oauth2::storage::{TokenInfo, TokenStorage, TokenStorageError};
use yup_oauth2::authorized_user::AuthorizedUserSecret;
use yup_oauth2::ApplicationSecret;

use crate::error::{ReplyError, Result};

/// Read access to messages
pub const READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

/// Draft creation
pub const COMPOSE_SCOPE: &str = "https://www.googleapis.com/auth/gmail.compose";

/// Gmail API scopes required to read mail and save drafts
pub const REQUIRED_SCOPES: &[&str] = &[READONLY_SCOPE, COMPOSE_SCOPE];

/// Google's OAuth2 token endpoint
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens this close to expiry are treated as expired
pub const REFRESH_THRESHOLD_SECS: i64 = 225;

/// Type alias for Gmail Hub to simplify type signatures
pub type GmailHub =
    Gmail<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>>;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Authorized-user credential as persisted in the token file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "token", default)]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl Credential {
    /// A credential without an expiry never expires
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => now + Duration::seconds(REFRESH_THRESHOLD_SECS) >= expiry,
            None => false,
        }
    }

    /// Scopes in `required` that were not granted
    pub fn missing_scopes<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|scope| !self.scopes.iter().any(|granted| granted == scope))
            .collect()
    }

    /// Whether every scope in `required` was granted
    pub fn has_scopes(&self, required: &[&str]) -> bool {
        self.missing_scopes(required).is_empty()
    }

    pub fn is_valid(&self, now: DateTime<Utc>, required: &[&str]) -> bool {
        self.access_token.is_some() && !self.is_expired(now) && self.has_scopes(required)
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }
}

/// Token file on disk
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted credential
    ///
    /// A missing file is `None`. A malformed one is logged and also `None`,
    /// which sends the caller to the consent flow.
    pub async fn load(&self) -> Result<Option<Credential>> {
        if !self.path.exists() {
            debug!("No token file at {:?}", self.path);
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        match serde_json::from_str::<Credential>(&content) {
            Ok(credential) => Ok(Some(credential)),
            Err(e) => {
                warn!("Ignoring unreadable token file {:?}: {}", self.path, e);
                Ok(None)
            }
        }
    }

    pub async fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_string_pretty(credential)?;
        tokio::fs::write(&self.path, content).await?;
        secure_token_file(&self.path).await?;

        debug!("Persisted credential to {:?}", self.path);
        Ok(())
    }

    /// Delete the token file if it exists
    pub async fn remove(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        tokio::fs::remove_file(&self.path).await?;
        Ok(true)
    }
}

/// Exchanges a refresh token for a new access token
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, credential: &Credential, scopes: &[&str]) -> Result<Credential>;
}

/// Interactive browser consent
#[async_trait]
pub trait ConsentFlow: Send + Sync {
    async fn authorize(&self, secret: ApplicationSecret, scopes: &[&str]) -> Result<Credential>;
}

/// Supplies a usable credential, persisting any new one
pub struct CredentialProvider<R, F> {
    store: TokenStore,
    credentials_path: PathBuf,
    refresher: R,
    flow: F,
    scopes: &'static [&'static str],
}

impl<R, F> CredentialProvider<R, F>
where
    R: TokenRefresher,
    F: ConsentFlow,
{
    pub fn new(store: TokenStore, credentials_path: impl Into<PathBuf>, refresher: R, flow: F) -> Self {
        Self {
            store,
            credentials_path: credentials_path.into(),
            refresher,
            flow,
            scopes: REQUIRED_SCOPES,
        }
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub async fn obtain(&self) -> Result<Credential> {
        self.obtain_at(Utc::now()).await
    }

    /// Credential policy evaluated against a fixed clock
    ///
    /// Valid persisted credential first, then a single refresh attempt, then
    /// the consent flow. Refresh failures do not fall through to consent.
    pub async fn obtain_at(&self, now: DateTime<Utc>) -> Result<Credential> {
        let persisted = self.store.load().await?;

        if let Some(credential) = persisted {
            if credential.is_valid(now, self.scopes) {
                debug!("Using persisted credential");
                return Ok(credential);
            }

            if credential.is_expired(now) && credential.can_refresh() {
                info!("Access token expired, refreshing");
                let refreshed = self.refresher.refresh(&credential, self.scopes).await?;
                self.store.save(&refreshed).await?;
                return Ok(refreshed);
            }

            let missing = credential.missing_scopes(self.scopes);
            if !missing.is_empty() {
                warn!(
                    "Persisted credential lacks scope(s) {}, requesting consent again",
                    missing.join(", ")
                );
            }
            debug!("Persisted credential unusable, starting consent flow");
        }

        let secret = self.read_client_secret().await?;
        info!("Starting interactive consent flow");
        let credential = self.flow.authorize(secret, self.scopes).await?;
        self.store.save(&credential).await?;
        Ok(credential)
    }

    async fn read_client_secret(&self) -> Result<ApplicationSecret> {
        if !self.credentials_path.exists() {
            return Err(ReplyError::AuthConfiguration(format!(
                "{} not found. Please download it from Google Cloud Console.",
                self.credentials_path.display()
            )));
        }

        yup_oauth2::read_application_secret(&self.credentials_path)
            .await
            .map_err(|e| {
                ReplyError::AuthConfiguration(format!("Failed to read credentials: {}", e))
            })
    }
}

/// Refresh through Google's token endpoint
#[derive(Debug, Default, Clone, Copy)]
pub struct GoogleTokenRefresher;

#[async_trait]
impl TokenRefresher for GoogleTokenRefresher {
    async fn refresh(&self, credential: &Credential, scopes: &[&str]) -> Result<Credential> {
        let refresh_token = credential
            .refresh_token
            .clone()
            .ok_or_else(|| ReplyError::TokenRefresh("No refresh token available".to_string()))?;

        let secret = AuthorizedUserSecret {
            client_id: credential.client_id.clone(),
            client_secret: credential.client_secret.clone(),
            refresh_token,
            key_type: "authorized_user".to_string(),
        };

        let auth = yup_oauth2::AuthorizedUserAuthenticator::builder(secret)
            .build()
            .await
            .map_err(|e| {
                ReplyError::TokenRefresh(format!("Failed to build authenticator: {}", e))
            })?;

        let token = auth
            .token(scopes)
            .await
            .map_err(|e| ReplyError::TokenRefresh(e.to_string()))?;

        let access_token = token
            .token()
            .ok_or_else(|| ReplyError::TokenRefresh("Provider returned no access token".to_string()))?
            .to_string();

        Ok(Credential {
            access_token: Some(access_token),
            expiry: token
                .expiration_time()
                .and_then(|t| DateTime::from_timestamp(t.unix_timestamp(), 0)),
            ..credential.clone()
        })
    }
}

/// Holds whatever token the installed flow hands to its storage
#[derive(Clone, Default)]
struct CapturedToken(Arc<Mutex<Option<TokenInfo>>>);

impl CapturedToken {
    fn refresh_token(&self) -> Option<String> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .and_then(|info| info.refresh_token.clone())
    }
}

#[async_trait]
impl TokenStorage for CapturedToken {
    async fn set(
        &self,
        _scopes: &[&str],
        token: TokenInfo,
    ) -> std::result::Result<(), TokenStorageError> {
        *self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(token);
        Ok(())
    }

    async fn get(&self, _scopes: &[&str]) -> Option<TokenInfo> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// Installed-app flow with a loopback redirect on an ephemeral port
#[derive(Debug, Default, Clone, Copy)]
pub struct InstalledAppConsent;

#[async_trait]
impl ConsentFlow for InstalledAppConsent {
    async fn authorize(&self, secret: ApplicationSecret, scopes: &[&str]) -> Result<Credential> {
        let captured = CapturedToken::default();

        // HTTPRedirect opens a browser for user authorization
        let auth = yup_oauth2::InstalledFlowAuthenticator::builder(
            secret.clone(),
            yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
        )
        .with_storage(Box::new(captured.clone()))
        .build()
        .await
        .map_err(|e| ReplyError::AuthFlow(format!("Failed to build authenticator: {}", e)))?;

        let token = auth
            .token(scopes)
            .await
            .map_err(|e| ReplyError::AuthFlow(format!("Failed to obtain token: {}", e)))?;

        let access_token = token
            .token()
            .ok_or_else(|| ReplyError::AuthFlow("Consent returned no access token".to_string()))?
            .to_string();

        Ok(Credential {
            access_token: Some(access_token),
            refresh_token: captured.refresh_token(),
            token_uri: secret.token_uri,
            client_id: secret.client_id,
            client_secret: secret.client_secret,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            expiry: token
                .expiration_time()
                .and_then(|t| DateTime::from_timestamp(t.unix_timestamp(), 0)),
        })
    }
}

/// Credential provider wired to Google's endpoints
pub fn google_provider(
    credentials_path: &Path,
    token_path: &Path,
) -> CredentialProvider<GoogleTokenRefresher, InstalledAppConsent> {
    CredentialProvider::new(
        TokenStore::new(token_path),
        credentials_path,
        GoogleTokenRefresher,
        InstalledAppConsent,
    )
}

/// Build the Gmail API hub authenticated with the credential's access token
pub fn build_hub(credential: &Credential) -> Result<GmailHub> {
    let access_token = credential
        .access_token
        .clone()
        .ok_or_else(|| ReplyError::AuthFlow("Credential has no access token".to_string()))?;

    // Use HTTP/1 for compatibility (HTTP/2 is default but HTTP/1 works better with google-gmail1)
    let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
        .build(
            hyper_rustls::HttpsConnectorBuilder::new()
                .with_native_roots()
                .map_err(|e| {
                    ReplyError::MailboxAccess(format!("Failed to load TLS roots: {}", e))
                })?
                .https_or_http()
                .enable_http1()
                .build(),
        );

    Ok(Gmail::new(client, access_token))
}

/// Secure token file permissions on Unix systems
///
/// Sets file permissions to 0600 (read/write for owner only)
#[cfg(unix)]
pub async fn secure_token_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

/// Windows uses ACLs; the file inherits the profile directory's
#[cfg(windows)]
pub async fn secure_token_file(_path: &Path) -> Result<()> {
    Ok(())
}
