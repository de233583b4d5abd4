//! The console façade: session plus backend bindings.
//!
//! Every authenticated call goes through [`Console::authed`], which supplies
//! the current token and turns a backend 401 into a forced logout. Admin
//! operations are checked locally before any request is sent; the backend
//! still has the final word.

use std::future::Future;
use std::sync::Arc;

use tounet_auth::{
    AccountStatus, AuthToken, DashboardView, PermissionLevel, accessible_apps, authorize,
    authorize_grant,
};
use tounet_core::{AppRecordId, UserId};

use crate::api::ApiClient;
use crate::config::ConsoleConfig;
use crate::error::{ApiError, ConsoleError};
use crate::session::{SessionManager, SessionSnapshot};
use crate::token_store::{FileTokenStore, TokenStore};
use crate::types::{
    App, AuditLog, CreateAppRequest, CreateUserRequest, GenerateNKeyRequest, InviteCode,
    LoginRequest, NKey, PageRequest, Paginated, RegisterRequest, UpdateAppRequest,
    UpdateProfileRequest, UpdateUserRequest, User, ValidateNKeyRequest,
};

/// Shared console state. Cheap to clone.
#[derive(Clone)]
pub struct Console {
    session: Arc<SessionManager<ApiClient>>,
}

impl Console {
    pub fn new(session: Arc<SessionManager<ApiClient>>) -> Self {
        Self { session }
    }

    /// Wire a console backed by the configured token file.
    pub fn from_config(config: &ConsoleConfig) -> Result<Self, ConsoleError> {
        let api = ApiClient::new(config)?;
        let store: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(&config.token_path));
        Ok(Self::new(Arc::new(SessionManager::new(api, store))))
    }

    pub fn session(&self) -> &Arc<SessionManager<ApiClient>> {
        &self.session
    }

    pub fn api(&self) -> &ApiClient {
        self.session.fetcher()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Session
    // ─────────────────────────────────────────────────────────────────────────

    /// Resume a persisted session, if any.
    pub async fn restore(&self) -> Result<Option<User>, ConsoleError> {
        Ok(self.session.restore().await?)
    }

    /// Log in with credentials.
    ///
    /// Like every other endpoint, a 401 from `/login` ends the current session
    /// before the error is returned.
    pub async fn login_with_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<User, ConsoleError> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let token = self.unauthed(self.api().login(&request).await)?;

        Ok(self.session.login_and_resolve(token).await?)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<User, ConsoleError> {
        self.unauthed(self.api().register(request).await)
    }

    pub fn logout(&self) {
        self.session.logout();
    }

    /// Which dashboard the current identity lands on.
    pub fn dashboard(&self) -> Option<DashboardView> {
        self.session.status().map(DashboardView::for_status)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Self-service
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn me(&self) -> Result<User, ConsoleError> {
        self.authed(|api, token| async move { api.me(&token).await })
            .await
    }

    pub async fn update_me(&self, request: &UpdateProfileRequest) -> Result<User, ConsoleError> {
        self.authed(|api, token| async move { api.update_me(&token, request).await })
            .await
    }

    pub async fn my_apps(&self) -> Result<Vec<App>, ConsoleError> {
        self.authed(|api, token| async move { api.my_apps(&token).await })
            .await
    }

    /// Active applications the current identity clears locally.
    ///
    /// The backend's answer is filtered again by level and `is_active`, so a
    /// misconfigured listing never widens access.
    pub async fn accessible_apps(&self) -> Result<Vec<App>, ConsoleError> {
        let apps = self.my_apps().await?;
        let Some(status) = self.session.status() else {
            return Ok(Vec::new());
        };

        Ok(accessible_apps(&apps, &status)
            .into_iter()
            .filter(|app| app.is_active)
            .cloned()
            .collect())
    }

    pub async fn generate_nkey(&self, request: &GenerateNKeyRequest) -> Result<NKey, ConsoleError> {
        self.authed(|api, token| async move { api.generate_nkey(&token, request).await })
            .await
    }

    pub async fn validate_nkey(&self, request: &ValidateNKeyRequest) -> Result<bool, ConsoleError> {
        self.authed(|api, token| async move { api.validate_nkey(&token, request).await })
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Admin
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn list_users(&self, page: PageRequest) -> Result<Paginated<User>, ConsoleError> {
        self.require(PermissionLevel::Admin)?;
        self.authed(|api, token| async move { api.list_users(&token, page).await })
            .await
    }

    pub async fn create_user(&self, request: &CreateUserRequest) -> Result<User, ConsoleError> {
        let actor = self.require(PermissionLevel::Admin)?;
        authorize_grant(&actor, request.status)?;
        self.authed(|api, token| async move { api.create_user(&token, request).await })
            .await
    }

    pub async fn update_user(
        &self,
        id: UserId,
        request: &UpdateUserRequest,
    ) -> Result<User, ConsoleError> {
        let actor = self.require(PermissionLevel::Admin)?;
        if let Some(target) = request.status {
            authorize_grant(&actor, target)?;
        }
        self.authed(|api, token| async move { api.update_user(&token, id, request).await })
            .await
    }

    pub async fn delete_user(&self, id: UserId) -> Result<(), ConsoleError> {
        self.require(PermissionLevel::Admin)?;
        self.authed(|api, token| async move { api.delete_user(&token, id).await })
            .await
    }

    pub async fn list_apps(&self) -> Result<Vec<App>, ConsoleError> {
        self.require(PermissionLevel::Admin)?;
        self.authed(|api, token| async move { api.list_apps(&token).await })
            .await
    }

    pub async fn create_app(&self, request: &CreateAppRequest) -> Result<App, ConsoleError> {
        self.require(PermissionLevel::Admin)?;
        self.authed(|api, token| async move { api.create_app(&token, request).await })
            .await
    }

    pub async fn update_app(
        &self,
        id: AppRecordId,
        request: &UpdateAppRequest,
    ) -> Result<App, ConsoleError> {
        self.require(PermissionLevel::Admin)?;
        self.authed(|api, token| async move { api.update_app(&token, id, request).await })
            .await
    }

    pub async fn delete_app(&self, id: AppRecordId) -> Result<(), ConsoleError> {
        self.require(PermissionLevel::Admin)?;
        self.authed(|api, token| async move { api.delete_app(&token, id).await })
            .await
    }

    pub async fn list_invite_codes(&self) -> Result<Vec<InviteCode>, ConsoleError> {
        self.require(PermissionLevel::Admin)?;
        self.authed(|api, token| async move { api.list_invite_codes(&token).await })
            .await
    }

    pub async fn generate_invite_code(&self) -> Result<InviteCode, ConsoleError> {
        self.require(PermissionLevel::Admin)?;
        self.authed(|api, token| async move { api.generate_invite_code(&token).await })
            .await
    }

    pub async fn list_audit_logs(
        &self,
        page: PageRequest,
    ) -> Result<Paginated<AuditLog>, ConsoleError> {
        self.require(PermissionLevel::Admin)?;
        self.authed(|api, token| async move { api.list_audit_logs(&token, page).await })
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────

    /// Local pre-check against the authenticated identity.
    fn require(&self, required: PermissionLevel) -> Result<AccountStatus, ConsoleError> {
        let status = self.session.status().ok_or(ConsoleError::NotAuthenticated)?;
        authorize(&status, required)?;
        Ok(status)
    }

    /// Outcome of a call made without a bearer token. An auth failure still
    /// counts against whatever session is current.
    fn unauthed<T>(&self, result: Result<T, ApiError>) -> Result<T, ConsoleError> {
        match result {
            Err(err) if err.is_auth_failure() => {
                if let Some(current) = self.session.token() {
                    self.session.report_auth_failure(&current);
                }
                Err(err.into())
            }
            other => Ok(other?),
        }
    }

    async fn authed<'a, T, Fut>(
        &'a self,
        call: impl FnOnce(&'a ApiClient, AuthToken) -> Fut,
    ) -> Result<T, ConsoleError>
    where
        Fut: Future<Output = Result<T, ApiError>> + 'a,
    {
        let token = self.session.token().ok_or(ConsoleError::NotAuthenticated)?;

        match call(self.api(), token.clone()).await {
            Ok(value) => Ok(value),
            Err(err) if err.is_auth_failure() => {
                self.session.report_auth_failure(&token);
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }
}
