use serde::Serialize;
use thiserror::Error;

use crate::permissions::{AsLevel, PermissionLevel, display_name, has_permission};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("unrecognized permission level")]
    UnknownLevel,

    #[error("forbidden: requires '{required}', actor is '{actor}'")]
    Forbidden {
        actor: PermissionLevel,
        required: PermissionLevel,
    },

    #[error("cannot grant '{target}' while acting as '{actor}'")]
    GrantDenied {
        actor: PermissionLevel,
        target: PermissionLevel,
    },
}

/// Decide whether an actor satisfies a required level.
///
/// - No IO
/// - No panics
/// - Unrecognized levels on either side are denied
pub fn authorize(actor: impl AsLevel, required: impl AsLevel) -> Result<(), AuthzError> {
    let (Some(actor), Some(required)) = (actor.as_level(), required.as_level()) else {
        return Err(AuthzError::UnknownLevel);
    };

    if has_permission(actor, required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden { actor, required })
    }
}

/// Decide whether an actor may hand `target` to another account (user
/// creation, promotion).
///
/// Nobody grants above their own level, and disabled accounts grant nothing.
pub fn authorize_grant(actor: impl AsLevel, target: impl AsLevel) -> Result<(), AuthzError> {
    let (Some(actor), Some(target)) = (actor.as_level(), target.as_level()) else {
        return Err(AuthzError::UnknownLevel);
    };

    if actor == PermissionLevel::DisabledUser || !actor.at_least(target) {
        return Err(AuthzError::GrantDenied { actor, target });
    }

    Ok(())
}

/// Which dashboard an identity lands on after login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardView {
    Admin,
    User,
}

impl DashboardView {
    pub fn for_status(status: impl AsLevel) -> Self {
        if has_permission(status, PermissionLevel::Admin) {
            DashboardView::Admin
        } else {
            DashboardView::User
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub granted: bool,

    /// Human-readable reason for the decision.
    pub reason: String,

    pub actor_level: Option<PermissionLevel>,
    pub actor_rank: Option<u8>,
    pub required_level: Option<PermissionLevel>,
    pub required_rank: Option<u8>,

    /// If denied, this explains what was missing.
    pub denial_reason: Option<DenialReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    UnknownActorLevel,
    UnknownRequiredLevel,
    InsufficientLevel,
}

/// Explain why an authorization decision was made (or would be made).
///
/// Answers "why is this control hidden?" for support and debugging screens.
pub fn explain_authorization(
    actor: impl AsLevel,
    required: impl AsLevel,
) -> AuthorizationExplanation {
    let actor_level = actor.as_level();
    let required_level = required.as_level();

    let mut explanation = AuthorizationExplanation {
        granted: false,
        reason: String::new(),
        actor_level,
        actor_rank: actor_level.map(PermissionLevel::rank),
        required_level,
        required_rank: required_level.map(PermissionLevel::rank),
        denial_reason: None,
    };

    match (actor_level, required_level) {
        (None, _) => {
            explanation.reason = "Actor level is not part of the known hierarchy".to_string();
            explanation.denial_reason = Some(DenialReason {
                kind: DenialKind::UnknownActorLevel,
                message: "Unrecognized levels are denied every permission".to_string(),
                suggestions: vec![
                    "Check that the backend and console agree on the level names".to_string(),
                    "Ask an administrator to reassign a known level to this account".to_string(),
                ],
            });
        }
        (Some(_), None) => {
            explanation.reason = "Required level is not part of the known hierarchy".to_string();
            explanation.denial_reason = Some(DenialReason {
                kind: DenialKind::UnknownRequiredLevel,
                message: "Resources gated by an unrecognized level are unreachable".to_string(),
                suggestions: vec![
                    "Update the resource to require one of: admin, trusted, user, disableduser"
                        .to_string(),
                ],
            });
        }
        (Some(actor), Some(required)) if actor.at_least(required) => {
            explanation.granted = true;
            explanation.reason = format!(
                "{} (rank {}) meets the {} requirement (rank {})",
                display_name(actor),
                actor.rank(),
                display_name(required),
                required.rank()
            );
        }
        (Some(actor), Some(required)) => {
            explanation.reason = format!(
                "{} (rank {}) is below the {} requirement (rank {})",
                display_name(actor),
                actor.rank(),
                display_name(required),
                required.rank()
            );
            explanation.denial_reason = Some(DenialReason {
                kind: DenialKind::InsufficientLevel,
                message: format!("Requires '{required}' or above"),
                suggestions: vec![format!(
                    "Ask an administrator to raise the account to '{required}'"
                )],
            });
        }
    }

    explanation
}

/// Display metadata for one level (for level pickers and audit screens).
#[derive(Debug, Clone, Serialize)]
pub struct LevelDefinition {
    pub level: PermissionLevel,
    pub rank: u8,
    pub name: &'static str,
    pub color: crate::ColorTag,
    pub description: &'static str,
}

/// The full hierarchy, highest rank first.
pub fn level_definitions() -> Vec<LevelDefinition> {
    PermissionLevel::ALL
        .iter()
        .rev()
        .map(|&level| LevelDefinition {
            level,
            rank: level.rank(),
            name: display_name(level),
            color: crate::display_color(level),
            description: level_description(level),
        })
        .collect()
}

fn level_description(level: PermissionLevel) -> &'static str {
    match level {
        PermissionLevel::Admin => "Manages users, applications and invite codes",
        PermissionLevel::Trusted => "Reaches applications reserved for trusted members",
        PermissionLevel::User => "Edits their own profile and generates temporary keys",
        PermissionLevel::DisabledUser => "Account is disabled and reaches nothing gated",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PermissionLevel::*;

    #[test]
    fn authorize_compares_ranks() {
        assert_eq!(authorize(Admin, Trusted), Ok(()));
        assert_eq!(
            authorize(User, Admin),
            Err(AuthzError::Forbidden {
                actor: User,
                required: Admin
            })
        );
        assert_eq!(authorize("bogus", User), Err(AuthzError::UnknownLevel));
    }

    #[test]
    fn grants_cannot_exceed_actor_level() {
        assert_eq!(authorize_grant(Admin, Admin), Ok(()));
        assert_eq!(authorize_grant(Trusted, User), Ok(()));
        assert!(matches!(
            authorize_grant(Trusted, Admin),
            Err(AuthzError::GrantDenied { .. })
        ));
        assert!(matches!(
            authorize_grant(DisabledUser, DisabledUser),
            Err(AuthzError::GrantDenied { .. })
        ));
    }

    #[test]
    fn dashboard_follows_admin_check() {
        assert_eq!(DashboardView::for_status(Admin), DashboardView::Admin);
        assert_eq!(DashboardView::for_status(Trusted), DashboardView::User);
        assert_eq!(DashboardView::for_status("root"), DashboardView::User);
    }

    #[test]
    fn explanation_for_denial_names_requirement() {
        let explanation = explain_authorization(User, Trusted);
        assert!(!explanation.granted);
        assert_eq!(explanation.actor_rank, Some(2));
        assert_eq!(explanation.required_rank, Some(3));

        let denial = explanation.denial_reason.unwrap();
        assert_eq!(denial.kind, DenialKind::InsufficientLevel);
        assert!(denial.message.contains("trusted"));
    }

    #[test]
    fn explanation_for_unknown_actor() {
        let explanation = explain_authorization("superuser", User);
        assert!(!explanation.granted);
        assert_eq!(
            explanation.denial_reason.map(|d| d.kind),
            Some(DenialKind::UnknownActorLevel)
        );
    }

    #[test]
    fn explanation_for_grant() {
        let explanation = explain_authorization(Admin, User);
        assert!(explanation.granted);
        assert!(explanation.denial_reason.is_none());
        assert!(explanation.reason.contains("Administrator"));
    }

    #[test]
    fn level_definitions_are_highest_first() {
        let defs = level_definitions();
        let levels: Vec<PermissionLevel> = defs.iter().map(|d| d.level).collect();
        assert_eq!(levels, vec![Admin, Trusted, User, DisabledUser]);
        assert_eq!(defs[0].name, "Administrator");
    }
}
