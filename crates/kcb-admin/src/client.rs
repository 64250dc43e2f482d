//! reqwest-backed [`AdminApi`] implementation.
//!
//! One `KeycloakAdminClient` is built explicitly at startup from an
//! [`AdminConnection`] and shared (`Arc<dyn AdminApi>`) by the evaluator and
//! the convergence engine. The bearer token is acquired lazily on the first
//! call and cached until shortly before it expires.
//!
//! No retry policy lives here: a failed call surfaces as an [`AdminError`].

use std::time::{Duration, Instant};

use reqwest::header::LOCATION;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    AdminApi, AdminError, AdminResult, ClientRepresentation, CredentialRepresentation,
    RealmRepresentation, RoleRepresentation, UserRepresentation,
};

/// Tokens closer than this to expiry are refreshed before use.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(30);

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60);

/// Longest error body echoed into an [`AdminError`] message.
const MAX_ERROR_BODY_CHARS: usize = 512;

// ---------------------------------------------------------------------------
// Connection settings
// ---------------------------------------------------------------------------

/// How the admin principal authenticates against the token endpoint.
///
/// **Values are redacted in `Debug` output.**
#[derive(Clone, PartialEq, Eq)]
pub enum AdminCredentials {
    /// Resource-owner password grant (typically the `admin-cli` client).
    Password { username: String, password: String },
    /// Client-credentials grant for a confidential admin client.
    ClientCredentials { client_secret: String },
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdminCredentials::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"<REDACTED>")
                .finish(),
            AdminCredentials::ClientCredentials { .. } => f
                .debug_struct("ClientCredentials")
                .field("client_secret", &"<REDACTED>")
                .finish(),
        }
    }
}

/// Everything needed to open an admin session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminConnection {
    /// Server root, e.g. `https://sso.school.example` (or `.../auth` on legacy layouts).
    pub base_url: String,
    /// Realm the admin principal lives in (usually `master`).
    pub admin_realm: String,
    /// Client used for token acquisition (usually `admin-cli`).
    pub client_id: String,
    pub credentials: AdminCredentials,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Admin REST client for a Keycloak-compatible identity service.
pub struct KeycloakAdminClient {
    conn: AdminConnection,
    http: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for KeycloakAdminClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeycloakAdminClient")
            .field("conn", &self.conn)
            .finish_non_exhaustive()
    }
}

impl KeycloakAdminClient {
    pub fn new(conn: AdminConnection) -> Self {
        Self::with_http_client(conn, reqwest::Client::new())
    }

    pub fn with_http_client(conn: AdminConnection, http: reqwest::Client) -> Self {
        Self {
            conn,
            http,
            token: Mutex::new(None),
        }
    }

    /// Builds `{base}/{segments...}` with each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> AdminResult<Url> {
        let mut url = Url::parse(&self.conn.base_url).map_err(|e| {
            AdminError::Config(format!("invalid base url '{}': {e}", self.conn.base_url))
        })?;
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                AdminError::Config(format!(
                    "base url '{}' cannot carry a path",
                    self.conn.base_url
                ))
            })?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    /// `{base}/admin/realms/{realm}/{segments...}`
    fn realm_url(&self, realm: &str, segments: &[&str]) -> AdminResult<Url> {
        let mut all: Vec<&str> = vec!["admin", "realms", realm];
        all.extend_from_slice(segments);
        self.url(&all)
    }

    fn token_url(&self) -> AdminResult<Url> {
        self.url(&[
            "realms",
            self.conn.admin_realm.as_str(),
            "protocol",
            "openid-connect",
            "token",
        ])
    }

    /// Returns a cached bearer token, fetching a fresh one when absent or near expiry.
    async fn access_token(&self) -> AdminResult<String> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                return Ok(cached.access_token.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        let token = fresh.access_token.clone();
        *guard = Some(fresh);
        Ok(token)
    }

    async fn fetch_token(&self) -> AdminResult<CachedToken> {
        let url = self.token_url()?;
        let client_id = self.conn.client_id.as_str();
        let form: Vec<(&str, &str)> = match &self.conn.credentials {
            AdminCredentials::Password { username, password } => vec![
                ("grant_type", "password"),
                ("client_id", client_id),
                ("username", username.as_str()),
                ("password", password.as_str()),
            ],
            AdminCredentials::ClientCredentials { client_secret } => vec![
                ("grant_type", "client_credentials"),
                ("client_id", client_id),
                ("client_secret", client_secret.as_str()),
            ],
        };

        debug!(admin_realm = %self.conn.admin_realm, client_id, "requesting admin token");

        let resp = self.http.post(url).form(&form).send().await?;
        // Bad credentials come back as 400 `invalid_grant`.
        if resp.status() == StatusCode::BAD_REQUEST {
            let body = truncate_body(resp.text().await.unwrap_or_default());
            return Err(AdminError::Auth {
                status: StatusCode::BAD_REQUEST.as_u16(),
                message: format!("token request rejected: {body}"),
            });
        }
        let resp = check_status(resp).await?;

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AdminError::Decode(format!("token response: {e}")))?;

        let ttl = body
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_TTL);

        Ok(CachedToken {
            access_token: body.access_token,
            expires_at: Instant::now() + ttl,
        })
    }

    async fn request(&self, method: Method, url: Url) -> AdminResult<reqwest::RequestBuilder> {
        debug!(%method, path = url.path(), "admin request");
        let token = self.access_token().await?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    /// GET that maps 404 to `None`.
    async fn get_optional<T: DeserializeOwned>(&self, url: Url) -> AdminResult<Option<T>> {
        let resp = self.request(Method::GET, url).await?.send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = check_status(resp).await?;
        let body = resp
            .json::<T>()
            .await
            .map_err(|e| AdminError::Decode(e.to_string()))?;
        Ok(Some(body))
    }

    async fn get_required<T: DeserializeOwned>(&self, url: Url) -> AdminResult<T> {
        let path = url.path().to_string();
        self.get_optional(url)
            .await?
            .ok_or(AdminError::NotFound(path))
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: &B,
    ) -> AdminResult<reqwest::Response> {
        let resp = self.request(method, url).await?.json(body).send().await?;
        check_status(resp).await
    }
}

async fn check_status(resp: reqwest::Response) -> AdminResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let path = resp.url().path().to_string();
    let body = truncate_body(resp.text().await.unwrap_or_default());
    let message = if body.is_empty() {
        path
    } else {
        format!("{path}: {body}")
    };

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AdminError::Auth {
            status: status.as_u16(),
            message,
        },
        StatusCode::NOT_FOUND => AdminError::NotFound(message),
        StatusCode::CONFLICT => AdminError::Conflict(message),
        other => AdminError::Api {
            status: other.as_u16(),
            message,
        },
    })
}

fn truncate_body(body: String) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        trimmed.to_string()
    } else {
        let mut s: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
        s.push('…');
        s
    }
}

/// Internal id from a `Location: .../clients/{id}` header.
fn id_from_location(location: &str) -> Option<String> {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// AdminApi
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl AdminApi for KeycloakAdminClient {
    async fn get_realm(&self, realm: &str) -> AdminResult<Option<RealmRepresentation>> {
        let url = self.realm_url(realm, &[])?;
        self.get_optional(url).await
    }

    async fn create_realm(&self, rep: &RealmRepresentation) -> AdminResult<()> {
        let url = self.url(&["admin", "realms"])?;
        self.send_json(Method::POST, url, rep).await?;
        Ok(())
    }

    async fn update_realm(&self, realm: &str, rep: &RealmRepresentation) -> AdminResult<()> {
        let url = self.realm_url(realm, &[])?;
        self.send_json(Method::PUT, url, rep).await?;
        Ok(())
    }

    async fn find_client(
        &self,
        realm: &str,
        client_id: &str,
    ) -> AdminResult<Option<ClientRepresentation>> {
        let url = self.realm_url(realm, &["clients"])?;
        let resp = self
            .request(Method::GET, url)
            .await?
            .query(&[("clientId", client_id)])
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let clients: Vec<ClientRepresentation> = resp
            .json()
            .await
            .map_err(|e| AdminError::Decode(e.to_string()))?;

        // The search endpoint may match loosely on older servers; keep exact matches only.
        Ok(clients
            .into_iter()
            .find(|c| c.client_id.as_deref() == Some(client_id)))
    }

    async fn create_client(&self, realm: &str, rep: &ClientRepresentation) -> AdminResult<String> {
        let url = self.realm_url(realm, &["clients"])?;
        let resp = self.send_json(Method::POST, url, rep).await?;

        let from_header = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(id_from_location);
        if let Some(id) = from_header {
            return Ok(id);
        }

        let client_id = rep.client_id.as_deref().unwrap_or_default();
        self.find_client(realm, client_id)
            .await?
            .and_then(|c| c.id)
            .ok_or_else(|| {
                AdminError::Decode(format!(
                    "created client '{client_id}' but could not determine its id"
                ))
            })
    }

    async fn update_client(
        &self,
        realm: &str,
        id: &str,
        rep: &ClientRepresentation,
    ) -> AdminResult<()> {
        let url = self.realm_url(realm, &["clients", id])?;
        self.send_json(Method::PUT, url, rep).await?;
        Ok(())
    }

    async fn get_client_secret(&self, realm: &str, id: &str) -> AdminResult<Option<String>> {
        let url = self.realm_url(realm, &["clients", id, "client-secret"])?;
        let cred: Option<CredentialRepresentation> = self.get_optional(url).await?;
        Ok(cred.and_then(|c| c.value))
    }

    async fn update_client_secret(&self, realm: &str, id: &str, secret: &str) -> AdminResult<()> {
        let url = self.realm_url(realm, &["clients", id])?;
        let patch = ClientRepresentation {
            secret: Some(secret.to_string()),
            ..Default::default()
        };
        self.send_json(Method::PUT, url, &patch).await?;
        Ok(())
    }

    async fn get_service_account_user(
        &self,
        realm: &str,
        id: &str,
    ) -> AdminResult<UserRepresentation> {
        let url = self.realm_url(realm, &["clients", id, "service-account-user"])?;
        self.get_required(url).await
    }

    async fn get_realm_role(
        &self,
        realm: &str,
        name: &str,
    ) -> AdminResult<Option<RoleRepresentation>> {
        let url = self.realm_url(realm, &["roles", name])?;
        self.get_optional(url).await
    }

    async fn create_realm_role(&self, realm: &str, rep: &RoleRepresentation) -> AdminResult<()> {
        let url = self.realm_url(realm, &["roles"])?;
        self.send_json(Method::POST, url, rep).await?;
        Ok(())
    }

    async fn update_realm_role(
        &self,
        realm: &str,
        name: &str,
        rep: &RoleRepresentation,
    ) -> AdminResult<()> {
        let url = self.realm_url(realm, &["roles", name])?;
        self.send_json(Method::PUT, url, rep).await?;
        Ok(())
    }

    async fn get_realm_role_client_composites(
        &self,
        realm: &str,
        role_name: &str,
        client_uuid: &str,
    ) -> AdminResult<Vec<RoleRepresentation>> {
        let url = self.realm_url(
            realm,
            &["roles", role_name, "composites", "clients", client_uuid],
        )?;
        Ok(self.get_optional(url).await?.unwrap_or_default())
    }

    async fn add_realm_role_composites(
        &self,
        realm: &str,
        role_name: &str,
        roles: &[RoleRepresentation],
    ) -> AdminResult<()> {
        let url = self.realm_url(realm, &["roles", role_name, "composites"])?;
        self.send_json(Method::POST, url, roles).await?;
        Ok(())
    }

    async fn get_client_role(
        &self,
        realm: &str,
        client_uuid: &str,
        name: &str,
    ) -> AdminResult<Option<RoleRepresentation>> {
        let url = self.realm_url(realm, &["clients", client_uuid, "roles", name])?;
        self.get_optional(url).await
    }

    async fn create_client_role(
        &self,
        realm: &str,
        client_uuid: &str,
        rep: &RoleRepresentation,
    ) -> AdminResult<()> {
        let url = self.realm_url(realm, &["clients", client_uuid, "roles"])?;
        self.send_json(Method::POST, url, rep).await?;
        Ok(())
    }

    async fn update_client_role(
        &self,
        realm: &str,
        client_uuid: &str,
        name: &str,
        rep: &RoleRepresentation,
    ) -> AdminResult<()> {
        let url = self.realm_url(realm, &["clients", client_uuid, "roles", name])?;
        self.send_json(Method::PUT, url, rep).await?;
        Ok(())
    }

    async fn assign_client_roles_to_user(
        &self,
        realm: &str,
        user_id: &str,
        client_uuid: &str,
        roles: &[RoleRepresentation],
    ) -> AdminResult<()> {
        let url = self.realm_url(
            realm,
            &["users", user_id, "role-mappings", "clients", client_uuid],
        )?;
        self.send_json(Method::POST, url, roles).await?;
        Ok(())
    }
}
