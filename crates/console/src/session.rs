//! Session lifecycle: one token, one identity, one writer.
//!
//! ```text
//!   Anonymous --login--> Pending --resolve ok--> Authenticated
//!       ^                   |                         |
//!       +----fetch failed---+                         |
//!       +----logout / expiry / backend 401------------+
//! ```
//!
//! Every login bumps a generation counter. An identity fetch is tied to the
//! generation that started it ([`FetchTicket`]); a result arriving after a
//! newer login or a logout is discarded.
//!
//! Expiry is checked lazily against the token's `exp` claim before every read
//! that depends on authentication.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use tounet_auth::{AccountStatus, AsLevel, AuthToken, PermissionLevel, has_permission};

use crate::error::{ApiError, SessionError, TokenStoreError};
use crate::token_store::TokenStore;
use crate::types::User;

/// Source of the identity behind a token (`GET /user/me` in production).
#[async_trait]
pub trait IdentityFetcher: Send + Sync {
    async fn fetch_identity(&self, token: &AuthToken) -> Result<User, ApiError>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Anonymous,
    /// Token accepted, identity fetch in flight.
    Pending,
    Authenticated,
}

/// Observable session state.
///
/// `identity` is only ever `Some` while `phase` is `Authenticated`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub token: Option<AuthToken>,
    pub identity: Option<User>,
    pub generation: u64,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.phase == SessionPhase::Authenticated
    }

    pub fn status(&self) -> Option<&AccountStatus> {
        self.identity.as_ref().map(|user| &user.status)
    }
}

/// Handle for completing one login's identity fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    token: AuthToken,
}

impl FetchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn token(&self) -> &AuthToken {
        &self.token
    }
}

pub struct SessionManager<F> {
    fetcher: F,
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    state: watch::Sender<SessionSnapshot>,
}

impl<F: IdentityFetcher> SessionManager<F> {
    pub fn new(fetcher: F, store: Arc<dyn TokenStore>) -> Self {
        Self::with_clock(fetcher, store, Arc::new(SystemClock))
    }

    pub fn with_clock(fetcher: F, store: Arc<dyn TokenStore>, clock: Arc<dyn Clock>) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            fetcher,
            store,
            clock,
            state,
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────────────

    /// Accept a freshly issued token and enter `Pending`.
    ///
    /// The token is persisted before the state changes. A token that is
    /// already expired or unreadable is refused and the session is cleared.
    pub fn login(&self, token: AuthToken) -> Result<FetchTicket, SessionError> {
        if let Err(err) = token.validate(self.clock.now()) {
            tracing::warn!(error = %err, "refusing unusable token at login");
            self.logout();
            return Err(SessionError::InvalidToken(err));
        }

        // Every store write happens under the state lock.
        let mut saved = Ok(());
        let mut generation = 0;
        self.state.send_if_modified(|s| {
            saved = self.store.save(&token);
            if saved.is_err() {
                return false;
            }
            s.generation += 1;
            s.phase = SessionPhase::Pending;
            s.token = Some(token.clone());
            s.identity = None;
            generation = s.generation;
            true
        });
        saved?;

        tracing::info!(generation, "session pending identity fetch");
        Ok(FetchTicket { generation, token })
    }

    /// Fetch the identity for `ticket` and commit it if the ticket is still
    /// current.
    ///
    /// A failed fetch logs the session out. A result for a superseded ticket
    /// changes nothing and yields [`SessionError::Superseded`].
    pub async fn resolve(&self, ticket: FetchTicket) -> Result<User, SessionError> {
        if !self.is_current(&ticket) {
            return Err(SessionError::Superseded);
        }

        let fetched = self.fetcher.fetch_identity(&ticket.token).await;

        match fetched {
            Ok(user) => {
                let committed = self.state.send_if_modified(|s| {
                    if s.generation != ticket.generation {
                        return false;
                    }
                    s.phase = SessionPhase::Authenticated;
                    s.identity = Some(user.clone());
                    true
                });

                if !committed {
                    tracing::debug!(generation = ticket.generation, "discarding stale identity");
                    return Err(SessionError::Superseded);
                }

                tracing::info!(
                    user_id = %user.id,
                    username = %user.username,
                    status = %user.status,
                    "session authenticated"
                );
                Ok(user)
            }
            Err(err) => {
                if !self.is_current(&ticket) {
                    tracing::debug!(generation = ticket.generation, "ignoring stale fetch failure");
                    return Err(SessionError::Superseded);
                }

                tracing::warn!(error = %err, "identity fetch failed, logging out");
                self.invalidate(&ticket.token);
                Err(SessionError::Rejected(err))
            }
        }
    }

    pub async fn login_and_resolve(&self, token: AuthToken) -> Result<User, SessionError> {
        let ticket = self.login(token)?;
        self.resolve(ticket).await
    }

    /// Boot from the durable store.
    ///
    /// `Ok(None)` means the session starts anonymous: no token, an unusable
    /// token, or an unreadable store file (which is cleared).
    pub async fn restore(&self) -> Result<Option<User>, SessionError> {
        let token = match self.store.load() {
            Ok(Some(token)) => token,
            Ok(None) => return Ok(None),
            Err(TokenStoreError::Corrupt(reason)) => {
                tracing::warn!(%reason, "discarding unreadable token store");
                self.logout();
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        match self.login_and_resolve(token).await {
            Ok(user) => Ok(Some(user)),
            Err(SessionError::InvalidToken(err)) => {
                tracing::info!(error = %err, "stored token is no longer usable");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Drop the session. Safe to call in any state, any number of times.
    pub fn logout(&self) {
        let changed = self.state.send_if_modified(|s| {
            if let Err(err) = self.store.clear() {
                tracing::warn!(error = %err, "failed to clear token store on logout");
            }
            if s.phase == SessionPhase::Anonymous && s.token.is_none() {
                return false;
            }
            s.generation += 1;
            s.phase = SessionPhase::Anonymous;
            s.token = None;
            s.identity = None;
            true
        });

        if changed {
            tracing::info!("session logged out");
        }
    }

    /// The backend rejected `token`. Logs out only if it is still the current
    /// token; a failure for an older token is ignored.
    pub fn report_auth_failure(&self, token: &AuthToken) -> bool {
        let is_current = self.state.borrow().token.as_ref() == Some(token);
        if !is_current {
            tracing::debug!("ignoring auth failure for a superseded token");
            return false;
        }

        tracing::warn!("backend rejected the session token, logging out");
        self.invalidate(token)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads (each one checks expiry first)
    // ─────────────────────────────────────────────────────────────────────────

    pub fn is_authenticated(&self) -> bool {
        self.expire_if_needed();
        self.state.borrow().is_authenticated()
    }

    /// The current token while a session exists (`Pending` or
    /// `Authenticated`).
    pub fn token(&self) -> Option<AuthToken> {
        self.expire_if_needed();
        self.state.borrow().token.clone()
    }

    pub fn identity(&self) -> Option<User> {
        self.expire_if_needed();
        self.state.borrow().identity.clone()
    }

    pub fn status(&self) -> Option<AccountStatus> {
        self.identity().map(|user| user.status)
    }

    /// Whether the authenticated identity meets `required`. Anonymous and
    /// pending sessions meet nothing.
    pub fn has_permission(&self, required: impl AsLevel) -> bool {
        match self.status() {
            Some(status) => has_permission(&status, required),
            None => false,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.has_permission(PermissionLevel::Admin)
    }

    pub fn is_trusted(&self) -> bool {
        self.has_permission(PermissionLevel::Trusted)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.expire_if_needed();
        self.state.borrow().clone()
    }

    /// Receive every committed state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────

    fn is_current(&self, ticket: &FetchTicket) -> bool {
        self.state.borrow().generation == ticket.generation
    }

    fn expire_if_needed(&self) {
        let token = self.state.borrow().token.clone();
        if let Some(token) = token {
            if token.is_expired(self.clock.now()) {
                tracing::info!("session token expired");
                self.invalidate(&token);
            }
        }
    }

    /// Log out if `token` is still the session's token.
    fn invalidate(&self, token: &AuthToken) -> bool {
        let changed = self.state.send_if_modified(|s| {
            if s.token.as_ref() != Some(token) {
                return false;
            }
            if let Err(err) = self.store.clear() {
                tracing::warn!(error = %err, "failed to clear token store");
            }
            s.generation += 1;
            s.phase = SessionPhase::Anonymous;
            s.token = None;
            s.identity = None;
            true
        });
        changed
    }
}

impl<F: IdentityFetcher + 'static> SessionManager<F> {
    /// Run [`SessionManager::resolve`] on the runtime without blocking the
    /// caller.
    pub fn spawn_resolve(self: &Arc<Self>, ticket: FetchTicket) -> JoinHandle<Result<User, SessionError>> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.resolve(ticket).await })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use base64::Engine as _;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use chrono::{Duration, TimeZone};
    use tokio::sync::oneshot;

    use tounet_core::UserId;

    use super::*;
    use crate::token_store::MemoryTokenStore;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    fn token(name: &str, exp: Option<DateTime<Utc>>) -> AuthToken {
        let mut claims = serde_json::json!({ "username": name, "iat": t0().timestamp() - 60 });
        if let Some(exp) = exp {
            claims["exp"] = exp.timestamp().into();
        }
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        AuthToken::new(format!("eyJhbGciOiJIUzI1NiJ9.{payload}.sig-{name}"))
    }

    fn user(id: i64, name: &str, status: &str) -> User {
        User {
            id: UserId::new(id),
            username: name.to_string(),
            phone: String::new(),
            pushdeer_token: String::new(),
            status: AccountStatus::from(status),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    /// Answers immediately from a fixed table keyed by token.
    #[derive(Default)]
    struct TableFetcher {
        users: HashMap<String, User>,
    }

    impl TableFetcher {
        fn with(mut self, token: &AuthToken, user: User) -> Self {
            self.users.insert(token.as_str().to_string(), user);
            self
        }
    }

    #[async_trait]
    impl IdentityFetcher for TableFetcher {
        async fn fetch_identity(&self, token: &AuthToken) -> Result<User, ApiError> {
            self.users
                .get(token.as_str())
                .cloned()
                .ok_or_else(|| ApiError::Unauthorized("unknown token".to_string()))
        }
    }

    /// Answers only when the test releases the matching gate.
    #[derive(Default)]
    struct GatedFetcher {
        gates: Mutex<HashMap<String, oneshot::Receiver<Result<User, ApiError>>>>,
    }

    impl GatedFetcher {
        fn gate(&self, token: &AuthToken) -> oneshot::Sender<Result<User, ApiError>> {
            let (tx, rx) = oneshot::channel();
            self.gates
                .lock()
                .unwrap()
                .insert(token.as_str().to_string(), rx);
            tx
        }
    }

    #[async_trait]
    impl IdentityFetcher for GatedFetcher {
        async fn fetch_identity(&self, token: &AuthToken) -> Result<User, ApiError> {
            let rx = self.gates.lock().unwrap().remove(token.as_str());
            match rx {
                Some(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(ApiError::Network("gate dropped".to_string()))),
                None => Err(ApiError::Network("no gate".to_string())),
            }
        }
    }

    fn manager<F: IdentityFetcher>(
        fetcher: F,
        store: Arc<MemoryTokenStore>,
    ) -> (SessionManager<F>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(t0()));
        let session = SessionManager::with_clock(fetcher, store, clock.clone());
        (session, clock)
    }

    #[tokio::test]
    async fn login_then_resolve_authenticates_and_persists() {
        let tok = token("alice", Some(t0() + Duration::hours(1)));
        let store = Arc::new(MemoryTokenStore::new());
        let (session, _) = manager(
            TableFetcher::default().with(&tok, user(1, "alice", "admin")),
            store.clone(),
        );

        let ticket = session.login(tok.clone()).unwrap();
        assert_eq!(session.snapshot().phase, SessionPhase::Pending);
        assert!(!session.is_authenticated());
        assert!(!session.has_permission(PermissionLevel::User));
        assert_eq!(store.load().unwrap(), Some(tok.clone()));

        let alice = session.resolve(ticket).await.unwrap();
        assert_eq!(alice.username, "alice");
        assert!(session.is_authenticated());
        assert!(session.is_admin());
        assert!(session.is_trusted());
        assert_eq!(session.token(), Some(tok));
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let tok = token("bob", None);
        let store = Arc::new(MemoryTokenStore::new());
        let (session, _) = manager(
            TableFetcher::default().with(&tok, user(2, "bob", "user")),
            store.clone(),
        );
        let mut rx = session.subscribe();

        session.logout();
        assert!(!rx.has_changed().unwrap());

        session.login_and_resolve(tok).await.unwrap();
        session.logout();
        session.logout();

        let snap = session.snapshot();
        assert_eq!(snap.phase, SessionPhase::Anonymous);
        assert!(snap.token.is_none() && snap.identity.is_none());
        assert!(store.load().unwrap().is_none());
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn stale_identity_is_discarded() {
        let t1 = token("first", None);
        let t2 = token("second", None);
        let fetcher = TableFetcher::default()
            .with(&t1, user(1, "first", "admin"))
            .with(&t2, user(2, "second", "user"));
        let (session, _) = manager(fetcher, Arc::new(MemoryTokenStore::new()));

        let first = session.login(t1).unwrap();
        let second = session.login(t2.clone()).unwrap();

        assert_eq!(session.resolve(second).await.unwrap().username, "second");
        assert!(matches!(session.resolve(first).await, Err(SessionError::Superseded)));

        let snap = session.snapshot();
        assert_eq!(snap.identity.unwrap().username, "second");
        assert_eq!(snap.token, Some(t2));
        assert!(!session.is_admin());
    }

    #[tokio::test]
    async fn out_of_order_responses_keep_the_latest_login() {
        let t1 = token("first", None);
        let t2 = token("second", None);
        let fetcher = GatedFetcher::default();
        let gate1 = fetcher.gate(&t1);
        let gate2 = fetcher.gate(&t2);

        let (session, _) = manager(fetcher, Arc::new(MemoryTokenStore::new()));
        let session = Arc::new(session);

        let first = session.spawn_resolve(session.login(t1).unwrap());
        tokio::task::yield_now().await;
        let second = session.spawn_resolve(session.login(t2).unwrap());
        tokio::task::yield_now().await;

        gate2.send(Ok(user(2, "second", "user"))).unwrap();
        assert_eq!(second.await.unwrap().unwrap().username, "second");

        gate1.send(Ok(user(1, "first", "admin"))).unwrap();
        assert!(matches!(first.await.unwrap(), Err(SessionError::Superseded)));

        assert_eq!(session.identity().unwrap().username, "second");
    }

    #[tokio::test]
    async fn late_failure_for_old_login_does_not_log_out() {
        let t1 = token("first", None);
        let t2 = token("second", None);
        let fetcher = GatedFetcher::default();
        let gate1 = fetcher.gate(&t1);
        let gate2 = fetcher.gate(&t2);

        let (session, _) = manager(fetcher, Arc::new(MemoryTokenStore::new()));
        let session = Arc::new(session);

        let first = session.spawn_resolve(session.login(t1).unwrap());
        tokio::task::yield_now().await;
        let second = session.spawn_resolve(session.login(t2).unwrap());
        tokio::task::yield_now().await;

        gate2.send(Ok(user(2, "second", "trusted"))).unwrap();
        second.await.unwrap().unwrap();

        gate1
            .send(Err(ApiError::Unauthorized("revoked".to_string())))
            .unwrap();
        assert!(matches!(first.await.unwrap(), Err(SessionError::Superseded)));
        assert!(session.is_trusted());
    }

    #[tokio::test]
    async fn fetch_failure_logs_out() {
        let tok = token("ghost", None);
        let store = Arc::new(MemoryTokenStore::new());
        let (session, _) = manager(TableFetcher::default(), store.clone());

        let err = session.login_and_resolve(tok).await.unwrap_err();
        assert!(matches!(err, SessionError::Rejected(ApiError::Unauthorized(_))));
        assert_eq!(session.snapshot().phase, SessionPhase::Anonymous);
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_token_is_refused_at_login() {
        let tok = token("late", Some(t0() - Duration::seconds(1)));
        let store = Arc::new(MemoryTokenStore::new());
        let (session, _) = manager(
            TableFetcher::default().with(&tok, user(1, "late", "admin")),
            store.clone(),
        );

        assert!(matches!(
            session.login(tok),
            Err(SessionError::InvalidToken(_))
        ));
        assert!(!session.is_authenticated());
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn expiry_is_noticed_on_next_read() {
        let tok = token("carol", Some(t0() + Duration::minutes(5)));
        let store = Arc::new(MemoryTokenStore::new());
        let (session, clock) = manager(
            TableFetcher::default().with(&tok, user(3, "carol", "admin")),
            store.clone(),
        );

        session.login_and_resolve(tok).await.unwrap();
        assert!(session.is_admin());

        clock.advance(Duration::minutes(5));
        assert!(!session.is_admin());
        assert!(!session.is_authenticated());
        assert!(session.token().is_none());
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn auth_failure_only_counts_for_current_token() {
        let t1 = token("old", None);
        let t2 = token("new", None);
        let (session, _) = manager(
            TableFetcher::default()
                .with(&t1, user(1, "old", "user"))
                .with(&t2, user(1, "new", "user")),
            Arc::new(MemoryTokenStore::new()),
        );

        session.login_and_resolve(t1.clone()).await.unwrap();
        session.login_and_resolve(t2.clone()).await.unwrap();

        assert!(!session.report_auth_failure(&t1));
        assert!(session.is_authenticated());

        assert!(session.report_auth_failure(&t2));
        assert!(!session.is_authenticated());
        assert!(!session.report_auth_failure(&t2));
    }

    #[test]
    fn store_follows_session_under_concurrent_invalidation() {
        let t1 = token("first", None);
        let t2 = token("second", None);
        let store = Arc::new(MemoryTokenStore::new());
        let (session, _) = manager(TableFetcher::default(), store.clone());

        for _ in 0..200 {
            session.logout();
            session.login(t1.clone()).unwrap();

            std::thread::scope(|scope| {
                scope.spawn(|| session.report_auth_failure(&t1));
                scope.spawn(|| session.login(t2.clone()).unwrap());
            });

            assert_eq!(session.snapshot().token, Some(t2.clone()));
            assert_eq!(store.load().unwrap(), Some(t2.clone()));
        }
    }

    #[tokio::test]
    async fn restore_paths() {
        // Nothing stored.
        let (session, _) = manager(TableFetcher::default(), Arc::new(MemoryTokenStore::new()));
        assert!(session.restore().await.unwrap().is_none());

        // Stored and still valid.
        let tok = token("dave", Some(t0() + Duration::days(1)));
        let store = Arc::new(MemoryTokenStore::with_token(tok.clone()));
        let (session, _) = manager(
            TableFetcher::default().with(&tok, user(4, "dave", "trusted")),
            store,
        );
        assert_eq!(session.restore().await.unwrap().unwrap().username, "dave");
        assert!(session.is_trusted());

        // Stored but expired.
        let stale = token("erin", Some(t0() - Duration::days(1)));
        let store = Arc::new(MemoryTokenStore::with_token(stale));
        let (session, _) = manager(TableFetcher::default(), store.clone());
        assert!(session.restore().await.unwrap().is_none());
        assert!(store.load().unwrap().is_none());

        // Stored but revoked on the backend.
        let revoked = token("frank", None);
        let store = Arc::new(MemoryTokenStore::with_token(revoked));
        let (session, _) = manager(TableFetcher::default(), store.clone());
        assert!(matches!(
            session.restore().await,
            Err(SessionError::Rejected(_))
        ));
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn unrecognized_status_grants_nothing() {
        let tok = token("mallory", None);
        let (session, _) = manager(
            TableFetcher::default().with(&tok, user(9, "mallory", "root")),
            Arc::new(MemoryTokenStore::new()),
        );

        session.login_and_resolve(tok).await.unwrap();
        assert!(session.is_authenticated());
        assert!(!session.has_permission(PermissionLevel::DisabledUser));
        assert!(!session.is_admin());
    }
}
