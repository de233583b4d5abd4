//! Permission engine: a closed, totally ordered hierarchy of access levels.
//!
//! `admin > trusted > user > disableduser`. Every decision in this module is a
//! pure rank comparison; nothing here performs IO or panics on unknown input.
//!
//! Values that arrive from the backend are modelled by [`AccountStatus`], which
//! keeps unrecognized strings instead of failing to deserialize. Unrecognized
//! values fail closed:
//! - as an **actor** level they satisfy no requirement;
//! - as a **required** level they are satisfied by no actor;
//! - display helpers fall back to "Unknown" / [`ColorTag::Gray`].

use core::cmp::Ordering;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use tounet_core::DomainError;

/// One of the four authorization tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    /// Older backends report this tier as `disabled`.
    #[serde(alias = "disabled")]
    DisabledUser,
    User,
    Trusted,
    Admin,
}

impl PermissionLevel {
    /// Every level, lowest rank first.
    pub const ALL: [PermissionLevel; 4] = [
        PermissionLevel::DisabledUser,
        PermissionLevel::User,
        PermissionLevel::Trusted,
        PermissionLevel::Admin,
    ];

    /// Fixed rank table. These numbers are compared across the wire and in
    /// cached UI state; they must never be renumbered.
    pub const fn rank(self) -> u8 {
        match self {
            PermissionLevel::DisabledUser => 1,
            PermissionLevel::User => 2,
            PermissionLevel::Trusted => 3,
            PermissionLevel::Admin => 4,
        }
    }

    /// Wire name (`"admin"`, `"trusted"`, `"user"`, `"disableduser"`).
    pub const fn as_str(self) -> &'static str {
        match self {
            PermissionLevel::DisabledUser => "disableduser",
            PermissionLevel::User => "user",
            PermissionLevel::Trusted => "trusted",
            PermissionLevel::Admin => "admin",
        }
    }

    pub fn at_least(self, required: PermissionLevel) -> bool {
        self.rank() >= required.rank()
    }
}

impl PartialOrd for PermissionLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PermissionLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl core::fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionLevel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "admin" => Ok(PermissionLevel::Admin),
            "trusted" => Ok(PermissionLevel::Trusted),
            "user" => Ok(PermissionLevel::User),
            "disableduser" | "disabled" => Ok(PermissionLevel::DisabledUser),
            other => Err(DomainError::validation(format!(
                "unknown permission level '{other}'"
            ))),
        }
    }
}

/// A permission level as reported by the backend.
///
/// Deserializes from any string; values outside the known hierarchy are kept
/// verbatim in [`AccountStatus::Unrecognized`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AccountStatus {
    Known(PermissionLevel),
    Unrecognized(String),
}

impl AccountStatus {
    pub fn level(&self) -> Option<PermissionLevel> {
        match self {
            AccountStatus::Known(level) => Some(*level),
            AccountStatus::Unrecognized(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AccountStatus::Known(level) => level.as_str(),
            AccountStatus::Unrecognized(raw) => raw,
        }
    }
}

impl From<PermissionLevel> for AccountStatus {
    fn from(level: PermissionLevel) -> Self {
        AccountStatus::Known(level)
    }
}

impl From<String> for AccountStatus {
    fn from(raw: String) -> Self {
        match raw.parse::<PermissionLevel>() {
            Ok(level) => AccountStatus::Known(level),
            Err(_) => AccountStatus::Unrecognized(raw),
        }
    }
}

impl From<&str> for AccountStatus {
    fn from(raw: &str) -> Self {
        AccountStatus::from(raw.to_string())
    }
}

impl From<AccountStatus> for String {
    fn from(status: AccountStatus) -> Self {
        match status {
            AccountStatus::Known(level) => level.as_str().to_string(),
            AccountStatus::Unrecognized(raw) => raw,
        }
    }
}

impl core::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything that can name a permission level (or fail to).
///
/// `None` means "not a level we know", which every decision treats fail-closed.
pub trait AsLevel {
    fn as_level(&self) -> Option<PermissionLevel>;
}

impl AsLevel for PermissionLevel {
    fn as_level(&self) -> Option<PermissionLevel> {
        Some(*self)
    }
}

impl AsLevel for Option<PermissionLevel> {
    fn as_level(&self) -> Option<PermissionLevel> {
        *self
    }
}

impl AsLevel for AccountStatus {
    fn as_level(&self) -> Option<PermissionLevel> {
        self.level()
    }
}

impl AsLevel for str {
    fn as_level(&self) -> Option<PermissionLevel> {
        self.parse().ok()
    }
}

impl AsLevel for String {
    fn as_level(&self) -> Option<PermissionLevel> {
        self.as_str().as_level()
    }
}

impl<T: AsLevel + ?Sized> AsLevel for &T {
    fn as_level(&self) -> Option<PermissionLevel> {
        (**self).as_level()
    }
}

/// A resource that declares the minimum level needed to reach it.
pub trait LevelGated {
    fn required_level(&self) -> Option<PermissionLevel>;
}

/// Fixed palette used to tint level badges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorTag {
    Purple,
    Blue,
    Green,
    Red,
    Gray,
}

impl ColorTag {
    pub const fn as_str(self) -> &'static str {
        match self {
            ColorTag::Purple => "purple",
            ColorTag::Blue => "blue",
            ColorTag::Green => "green",
            ColorTag::Red => "red",
            ColorTag::Gray => "gray",
        }
    }
}

/// Label and colour shown next to a user's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub name: &'static str,
    pub color: ColorTag,
}

/// Rank of a level, `None` for unrecognized values.
pub fn rank(level: impl AsLevel) -> Option<u8> {
    level.as_level().map(PermissionLevel::rank)
}

/// `true` iff `rank(actor) >= rank(required)`.
pub fn has_permission(actor: impl AsLevel, required: impl AsLevel) -> bool {
    match (actor.as_level(), required.as_level()) {
        (Some(actor), Some(required)) => actor.at_least(required),
        _ => false,
    }
}

/// Whether an actor may reach an application requiring `app_required`.
///
/// Same comparison as [`has_permission`]; the actor always goes first.
pub fn can_access_app(actor: impl AsLevel, app_required: impl AsLevel) -> bool {
    has_permission(actor, app_required)
}

pub fn display_name(level: impl AsLevel) -> &'static str {
    match level.as_level() {
        Some(PermissionLevel::Admin) => "Administrator",
        Some(PermissionLevel::Trusted) => "Trusted User",
        Some(PermissionLevel::User) => "Standard User",
        Some(PermissionLevel::DisabledUser) => "Disabled User",
        None => "Unknown",
    }
}

pub fn display_color(level: impl AsLevel) -> ColorTag {
    match level.as_level() {
        Some(PermissionLevel::Admin) => ColorTag::Purple,
        Some(PermissionLevel::Trusted) => ColorTag::Blue,
        Some(PermissionLevel::User) => ColorTag::Green,
        Some(PermissionLevel::DisabledUser) => ColorTag::Red,
        None => ColorTag::Gray,
    }
}

pub fn badge(level: impl AsLevel) -> Badge {
    let level = level.as_level();
    Badge {
        name: display_name(level),
        color: display_color(level),
    }
}

/// The apps an actor may reach, in their original order.
pub fn accessible_apps<'a, T: LevelGated>(apps: &'a [T], actor: impl AsLevel) -> Vec<&'a T> {
    let actor = actor.as_level();
    apps.iter()
        .filter(|app| can_access_app(actor, app.required_level()))
        .collect()
}

/// Every level with rank at or below `current`, highest first.
///
/// Feeds level pickers so an actor is never offered a level above their own.
/// An unrecognized level yields an empty list.
pub fn available_levels_at_or_below(current: impl AsLevel) -> Vec<PermissionLevel> {
    let Some(current) = current.as_level() else {
        return Vec::new();
    };

    PermissionLevel::ALL
        .iter()
        .rev()
        .copied()
        .filter(|level| level.rank() <= current.rank())
        .collect()
}

/// Pick `content` when the actor satisfies `required`, otherwise `fallback`.
pub fn gate<T>(actor: impl AsLevel, required: impl AsLevel, content: T, fallback: T) -> T {
    if has_permission(actor, required) {
        content
    } else {
        fallback
    }
}
