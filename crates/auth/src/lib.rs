//! `tounet-auth` — pure permission/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage. Decisions made
//! here are advisory on the client; the backend re-enforces them.

pub mod authorize;
pub mod claims;
pub mod permissions;
pub mod token;

pub use authorize::{
    AuthorizationExplanation, AuthzError, DashboardView, authorize, authorize_grant,
    explain_authorization, level_definitions,
};
pub use claims::{TokenClaims, TokenValidationError, decode_unverified, validate_claims};
pub use permissions::{
    AccountStatus, AsLevel, Badge, ColorTag, LevelGated, PermissionLevel, accessible_apps,
    available_levels_at_or_below, badge, can_access_app, display_color, display_name, gate,
    has_permission, rank,
};
pub use token::AuthToken;
