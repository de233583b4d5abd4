//! HTTP bindings for the TouNet backend.
//!
//! This client is stateless with respect to the session: every authenticated
//! call takes the bearer token explicitly. Reacting to an
//! [`ApiError::Unauthorized`] (forced logout) is the caller's job, see
//! [`crate::Console`].

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use tounet_auth::AuthToken;
use tounet_core::{AppRecordId, UserId};

use crate::config::ConsoleConfig;
use crate::error::ApiError;
use crate::session::IdentityFetcher;
use crate::types::{
    ApiResponse, App, AuditLog, CreateAppRequest, CreateUserRequest, GenerateNKeyRequest,
    InviteCode, InviteCodeList, LoginRequest, LoginResponse, LooseEnvelope, NKey, NKeyValidation,
    PageRequest, Paginated, RegisterRequest, UpdateAppRequest, UpdateProfileRequest,
    UpdateUserRequest, User, ValidateNKeyRequest,
};

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client honouring the configured transport timeout.
    pub fn new(config: &ConsoleConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Auth
    // ─────────────────────────────────────────────────────────────────────────

    /// Exchange credentials for a token. Bad credentials are `Unauthorized`.
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthToken, ApiError> {
        tracing::debug!(username = %request.username, "requesting login");
        let response: LoginResponse = send(self.http.post(self.url("/login")).json(request)).await?;
        Ok(AuthToken::new(response.token))
    }

    /// Create an account with an invite code.
    pub async fn register(&self, request: &RegisterRequest) -> Result<User, ApiError> {
        send(self.http.post(self.url("/register")).json(request)).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Self-service
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn me(&self, token: &AuthToken) -> Result<User, ApiError> {
        send(self.http.get(self.url("/user/me")).bearer_auth(token.as_str())).await
    }

    pub async fn update_me(
        &self,
        token: &AuthToken,
        request: &UpdateProfileRequest,
    ) -> Result<User, ApiError> {
        send(
            self.http
                .put(self.url("/user/me"))
                .bearer_auth(token.as_str())
                .json(request),
        )
        .await
    }

    /// Applications the backend says this user may reach.
    pub async fn my_apps(&self, token: &AuthToken) -> Result<Vec<App>, ApiError> {
        send(self.http.get(self.url("/user/apps")).bearer_auth(token.as_str())).await
    }

    pub async fn generate_nkey(
        &self,
        token: &AuthToken,
        request: &GenerateNKeyRequest,
    ) -> Result<NKey, ApiError> {
        send(
            self.http
                .post(self.url("/nkey/generate"))
                .bearer_auth(token.as_str())
                .json(request),
        )
        .await
    }

    pub async fn validate_nkey(
        &self,
        token: &AuthToken,
        request: &ValidateNKeyRequest,
    ) -> Result<bool, ApiError> {
        let result: NKeyValidation = send(
            self.http
                .post(self.url("/nkey/validate"))
                .bearer_auth(token.as_str())
                .json(request),
        )
        .await?;
        Ok(result.valid)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Admin: users
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn list_users(
        &self,
        token: &AuthToken,
        page: PageRequest,
    ) -> Result<Paginated<User>, ApiError> {
        send(
            self.http
                .get(self.url("/admin/users"))
                .bearer_auth(token.as_str())
                .query(&[("page", page.page), ("size", page.size)]),
        )
        .await
    }

    pub async fn create_user(
        &self,
        token: &AuthToken,
        request: &CreateUserRequest,
    ) -> Result<User, ApiError> {
        send(
            self.http
                .post(self.url("/admin/users"))
                .bearer_auth(token.as_str())
                .json(request),
        )
        .await
    }

    pub async fn update_user(
        &self,
        token: &AuthToken,
        id: UserId,
        request: &UpdateUserRequest,
    ) -> Result<User, ApiError> {
        send(
            self.http
                .put(self.url(&format!("/admin/users/{id}")))
                .bearer_auth(token.as_str())
                .json(request),
        )
        .await
    }

    pub async fn delete_user(&self, token: &AuthToken, id: UserId) -> Result<(), ApiError> {
        send_empty(
            self.http
                .delete(self.url(&format!("/admin/users/{id}")))
                .bearer_auth(token.as_str()),
        )
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Admin: applications
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn list_apps(&self, token: &AuthToken) -> Result<Vec<App>, ApiError> {
        send(self.http.get(self.url("/admin/apps")).bearer_auth(token.as_str())).await
    }

    pub async fn create_app(
        &self,
        token: &AuthToken,
        request: &CreateAppRequest,
    ) -> Result<App, ApiError> {
        send(
            self.http
                .post(self.url("/admin/apps"))
                .bearer_auth(token.as_str())
                .json(request),
        )
        .await
    }

    pub async fn update_app(
        &self,
        token: &AuthToken,
        id: AppRecordId,
        request: &UpdateAppRequest,
    ) -> Result<App, ApiError> {
        send(
            self.http
                .put(self.url(&format!("/admin/apps/{id}")))
                .bearer_auth(token.as_str())
                .json(request),
        )
        .await
    }

    pub async fn delete_app(&self, token: &AuthToken, id: AppRecordId) -> Result<(), ApiError> {
        send_empty(
            self.http
                .delete(self.url(&format!("/admin/apps/{id}")))
                .bearer_auth(token.as_str()),
        )
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Admin: invite codes and audit logs
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn list_invite_codes(&self, token: &AuthToken) -> Result<Vec<InviteCode>, ApiError> {
        let list: InviteCodeList = send(
            self.http
                .get(self.url("/admin/invite-codes"))
                .bearer_auth(token.as_str()),
        )
        .await?;
        Ok(list.into())
    }

    pub async fn generate_invite_code(&self, token: &AuthToken) -> Result<InviteCode, ApiError> {
        send(
            self.http
                .post(self.url("/admin/invite-codes"))
                .bearer_auth(token.as_str()),
        )
        .await
    }

    pub async fn list_audit_logs(
        &self,
        token: &AuthToken,
        page: PageRequest,
    ) -> Result<Paginated<AuditLog>, ApiError> {
        send(
            self.http
                .get(self.url("/admin/audit-logs"))
                .bearer_auth(token.as_str())
                .query(&[("page", page.page), ("size", page.size)]),
        )
        .await
    }
}

#[async_trait]
impl IdentityFetcher for ApiClient {
    async fn fetch_identity(&self, token: &AuthToken) -> Result<User, ApiError> {
        self.me(token).await
    }
}

/// Send a request and unwrap the `data` field of the response envelope.
async fn send<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, ApiError> {
    let body = send_raw(req).await?;
    decode_envelope(&body)
}

/// The envelope code is checked before `data` is required: error envelopes
/// carry `"data": null`.
fn decode_envelope<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let envelope: ApiResponse<Option<T>> =
        serde_json::from_slice(body).map_err(|e| ApiError::Parse(e.to_string()))?;

    if let Some(err) = error_for_code(envelope.code, &envelope.message) {
        return Err(err);
    }

    envelope
        .data
        .ok_or_else(|| ApiError::Parse("response envelope has no data".to_string()))
}

/// Send a request whose response carries no meaningful `data`.
async fn send_empty(req: RequestBuilder) -> Result<(), ApiError> {
    let body = send_raw(req).await?;
    if body.is_empty() {
        return Ok(());
    }

    let envelope: LooseEnvelope =
        serde_json::from_slice(&body).map_err(|e| ApiError::Parse(e.to_string()))?;

    match envelope.code {
        Some(code) => match error_for_code(code, envelope.message.as_deref().unwrap_or_default()) {
            Some(err) => Err(err),
            None => Ok(()),
        },
        None => Ok(()),
    }
}

async fn send_raw(req: RequestBuilder) -> Result<Vec<u8>, ApiError> {
    let resp = req
        .send()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;

    let status = resp.status();
    let body = resp.bytes().await.map_err(ApiError::from)?.to_vec();

    if !status.is_success() {
        return Err(error_for_status(status, &body));
    }

    Ok(body)
}

fn error_for_status(status: StatusCode, body: &[u8]) -> ApiError {
    let message = serde_json::from_slice::<LooseEnvelope>(body)
        .ok()
        .and_then(|env| env.message)
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());

    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ApiError::Validation(message),
        other => ApiError::Api(other.as_u16(), message),
    }
}

/// Some backend versions answer HTTP 200 with an error code in the envelope.
fn error_for_code(code: i64, message: &str) -> Option<ApiError> {
    match code {
        401 => Some(ApiError::Unauthorized(message.to_string())),
        400 | 422 => Some(ApiError::Validation(message.to_string())),
        400..=599 => Some(ApiError::Api(code as u16, message.to_string())),
        _ => None,
    }
}
