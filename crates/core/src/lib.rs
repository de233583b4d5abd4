//! `tounet-core` — shared building blocks for the TouNet console.
//!
//! This crate contains **pure** primitives (no transport or storage concerns).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{AppRecordId, AuditLogId, InviteCodeId, NKeyId, UserId};
