//! Wire types shared with the TouNet backend.
//!
//! Shapes follow the backend's JSON exactly; every response is wrapped in an
//! [`ApiResponse`] envelope.

use serde::{Deserialize, Serialize};

use tounet_auth::{AccountStatus, LevelGated, PermissionLevel};
use tounet_core::{AppRecordId, AuditLogId, InviteCodeId, NKeyId, UserId};

/// Response envelope used by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: T,
}

/// Envelope for endpoints whose `data` may be absent (deletes, errors).
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LooseEnvelope {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A user account as returned by `/user/me` and the admin listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub pushdeer_token: String,
    pub status: AccountStatus,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// An application that users may be allowed to reach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub id: AppRecordId,
    pub app_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub required_permission_level: AccountStatus,
    pub is_active: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl LevelGated for App {
    fn required_level(&self) -> Option<PermissionLevel> {
        self.required_permission_level.level()
    }
}

/// A temporary access key bound to users and applications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NKey {
    pub id: NKeyId,
    pub nkey: String,
    pub username: String,
    #[serde(default)]
    pub app_ids: Vec<String>,
    pub is_used: bool,
    pub expires_at: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub used_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteCode {
    pub id: InviteCodeId,
    pub code: String,
    pub is_used: bool,
    #[serde(default)]
    pub used_by: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub used_at: Option<String>,
}

/// Invite-code listings come back either as a bare array or wrapped in an
/// object, depending on the backend version.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum InviteCodeList {
    Bare(Vec<InviteCode>),
    Wrapped { invite_codes: Vec<InviteCode> },
}

impl From<InviteCodeList> for Vec<InviteCode> {
    fn from(list: InviteCodeList) -> Self {
        match list {
            InviteCodeList::Bare(codes) => codes,
            InviteCodeList::Wrapped { invite_codes } => invite_codes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: AuditLogId,
    pub user_id: UserId,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub user_agent: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub size: u32,
    pub pages: u32,
}

/// Page selector for listing endpoints (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, size: 10 }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub phone: String,
    pub pushdeer_token: String,
    pub invite_code: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pushdeer_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateNKeyRequest {
    pub username: Vec<String>,
    pub app_ids: Vec<String>,
}

impl GenerateNKeyRequest {
    /// Build a request for one user from a comma-separated list of app ids.
    pub fn for_user(username: impl Into<String>, app_ids: &str) -> Self {
        Self {
            username: vec![username.into()],
            app_ids: app_ids
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidateNKeyRequest {
    pub nkey: String,
    pub app_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct NKeyValidation {
    pub valid: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub status: PermissionLevel,
    pub phone: String,
    pub pushdeer_token: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PermissionLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pushdeer_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateAppRequest {
    pub app_id: String,
    pub name: String,
    pub description: String,
    pub required_permission_level: PermissionLevel,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateAppRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_permission_level: Option<PermissionLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn invite_codes_accept_both_shapes() {
        let code = json!({ "id": 1, "code": "ABC", "is_used": false, "created_at": "2024-01-01" });

        let bare: InviteCodeList = serde_json::from_value(json!([code.clone()])).unwrap();
        let wrapped: InviteCodeList =
            serde_json::from_value(json!({ "invite_codes": [code] })).unwrap();

        assert_eq!(Vec::<InviteCode>::from(bare).len(), 1);
        assert_eq!(Vec::<InviteCode>::from(wrapped)[0].code, "ABC");
    }

    #[test]
    fn user_keeps_unrecognized_status() {
        let user: User = serde_json::from_value(json!({
            "id": 3,
            "username": "mallory",
            "status": "root",
        }))
        .unwrap();

        assert_eq!(user.status, AccountStatus::Unrecognized("root".to_string()));
        assert_eq!(user.phone, "");
    }

    #[test]
    fn nkey_request_splits_app_ids() {
        let req = GenerateNKeyRequest::for_user("alice", "wiki, builds,,  chat ");
        assert_eq!(req.username, vec!["alice"]);
        assert_eq!(req.app_ids, vec!["wiki", "builds", "chat"]);
    }

    #[test]
    fn partial_updates_skip_absent_fields() {
        let body = serde_json::to_value(UpdateUserRequest {
            status: Some(PermissionLevel::Trusted),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(body, json!({ "status": "trusted" }));
    }
}
