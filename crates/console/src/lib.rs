//! `tounet-console`
//!
//! **Responsibility:** client core of the TouNet admin console.
//!
//! This crate provides:
//! - The session manager (single owner of token and identity)
//! - Durable token storage
//! - Typed bindings for the backend API
//! - A [`Console`] façade that applies local permission checks and reacts to
//!   backend 401s with a forced logout
//!
//! Permission decisions live in `tounet-auth`; the backend stays the authority.

pub mod api;
pub mod config;
pub mod console;
pub mod error;
pub mod session;
pub mod token_store;
pub mod types;

pub use api::ApiClient;
pub use config::{ConfigError, ConsoleConfig};
pub use console::Console;
pub use error::{ApiError, ConsoleError, SessionError, TokenStoreError};
pub use session::{
    Clock, FetchTicket, IdentityFetcher, ManualClock, SessionManager, SessionPhase,
    SessionSnapshot, SystemClock,
};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
