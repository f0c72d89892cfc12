//! Session manager
//!
//! Token authentication with an idle timeout. The session is
//! `Authenticated` only while a token and user are held and the last
//! qualifying activity is younger than the idle budget. Token, user and
//! activity timestamp are mirrored to the local store so a restart can
//! resume the session, subject to remote validation.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use aroma_core::permissions::{canonicalize_roles, migrate_user};
use aroma_core::storage::{parse_epoch_millis, save_json};
use aroma_core::{keys, Clock, KeyValueStore, UserProfile};
use aroma_net::{AuthApi, Credentials};

use crate::error::{Error, Result};
use crate::lock;

/// Inactivity budget used when none is configured
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Below this the countdown is flagged as running low
const LOW_TIME_THRESHOLD: Duration = Duration::from_secs(5 * 60);

/// Minimum spacing between activity timestamp writes
const PERSIST_INTERVAL_MS: i64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Anonymous,
    /// Credentials or a stored token are being checked
    Authenticating,
    Authenticated,
    /// Idle budget ran out; the session is being torn down
    Expired,
}

/// User input that counts as activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Pointer,
    Keyboard,
    Scroll,
    Touch,
}

/// Session transitions, for the UI shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Interactive login succeeded
    LoggedIn(UserProfile),
    /// A stored session was validated and resumed
    Restored(UserProfile),
    /// The idle timer fired
    Expired,
    /// The user signed out
    LoggedOut,
    /// The server stopped accepting the token
    Invalidated,
}

/// Time left before idle expiry, rendered for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    /// `m:ss`
    pub text: String,
    pub low: bool,
}

impl Countdown {
    fn from_remaining(remaining: Duration) -> Self {
        let secs = remaining.as_secs();
        Self {
            text: format!("{}:{:02}", secs / 60, secs % 60),
            low: remaining < LOW_TIME_THRESHOLD,
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    status: SessionStatus,
    token: Option<String>,
    user: Option<UserProfile>,
    /// Epoch millis of the last qualifying activity
    started_at: Option<i64>,
    persisted_at: Option<i64>,
    deadline: Option<Instant>,
    /// Bumped on every transition; timers carry the value they were armed with
    generation: u64,
}

struct Inner {
    auth: Arc<dyn AuthApi>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    credentials: Credentials,
    idle_timeout: Duration,
    state: Mutex<SessionState>,
    timer: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Inner {
    /// Deadline of the session armed at `generation`, if it is still live
    fn deadline_for(&self, generation: u64) -> Option<Instant> {
        let state = lock(&self.state);
        if state.generation == generation && state.status == SessionStatus::Authenticated {
            state.deadline
        } else {
            None
        }
    }
}

/// Owns the authentication state and the idle timer
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(
        auth: Arc<dyn AuthApi>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        credentials: Credentials,
        idle_timeout: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(Inner {
                auth,
                store,
                clock,
                credentials,
                idle_timeout,
                state: Mutex::new(SessionState::default()),
                timer: Mutex::new(None),
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        lock(&self.inner.state).status
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == SessionStatus::Authenticated
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        let state = lock(&self.inner.state);
        match state.status {
            SessionStatus::Authenticated => state.user.clone(),
            _ => None,
        }
    }

    pub fn token(&self) -> Option<String> {
        let state = lock(&self.inner.state);
        match state.status {
            SessionStatus::Authenticated => state.token.clone(),
            _ => None,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.inner.idle_timeout
    }

    /// Time left before the idle timer fires
    pub fn remaining(&self) -> Option<Duration> {
        let state = lock(&self.inner.state);
        if state.status != SessionStatus::Authenticated {
            return None;
        }
        state
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn countdown(&self) -> Option<Countdown> {
        self.remaining().map(Countdown::from_remaining)
    }

    /// Sign in with username and password.
    ///
    /// Roles come from the login response, or from the profile
    /// endpoint when the response carries none.
    pub async fn login(&self, username: &str, password: &str) -> Result<UserProfile> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(Error::Validation(
                "Username and password are required".to_string(),
            ));
        }

        let generation = self
            .begin_authenticating()
            .unwrap_or_else(|| lock(&self.inner.state).generation);
        match self.authenticate(username, password).await {
            Ok(_) if lock(&self.inner.state).generation != generation => {
                debug!(username, "Session changed while signing in, discarding login");
                Err(Error::NotAuthenticated)
            }
            Ok((token, user)) => {
                let now = self.inner.clock.now_millis();
                self.persist_session(&token, &user, now);
                self.establish(token, user.clone(), now, self.inner.idle_timeout);
                info!(username = %user.username, roles = ?user.roles, "Logged in");
                self.emit(SessionEvent::LoggedIn(user.clone()));
                Ok(user)
            }
            Err(e) => {
                self.abandon_authenticating(generation);
                warn!(username, error = %e, "Login failed");
                Err(e)
            }
        }
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<(String, UserProfile)> {
        let resp = self.inner.auth.login(username, password).await?;

        let roles = match resp.roles.filter(|roles| !roles.is_empty()) {
            Some(roles) => roles,
            None => {
                debug!("Login response carried no roles, asking the profile endpoint");
                self.inner.auth.profile(&resp.token).await?.roles
            }
        };

        let user = UserProfile::new(resp.username, resp.email, roles).canonicalized();
        Ok((resp.token, user))
    }

    /// Resume a stored session.
    ///
    /// Corrupt or partial stored state, a rejected token, and an
    /// exhausted idle budget all end in `Anonymous` with the store
    /// cleared. Nothing here is surfaced as an error.
    pub async fn restore(&self) -> SessionStatus {
        let Some((token, user, started_at)) = self.read_stored_session() else {
            return self.status();
        };
        let Some(generation) = self.begin_authenticating() else {
            return self.status();
        };

        let valid = match self.inner.auth.validate_token(&token).await {
            Ok(valid) => valid,
            Err(e) => {
                warn!(error = %e, "Could not validate stored token");
                false
            }
        };
        if !self.still_authenticating(generation) {
            return self.status();
        }
        if !valid {
            info!("Stored token no longer valid, clearing session");
            self.clear_session();
            return self.status();
        }

        let elapsed_ms = (self.inner.clock.now_millis() - started_at).max(0) as u64;
        let elapsed = Duration::from_millis(elapsed_ms);
        if elapsed >= self.inner.idle_timeout {
            lock(&self.inner.state).status = SessionStatus::Expired;
            info!(elapsed_secs = elapsed.as_secs(), "Stored session exceeded idle timeout");
            self.clear_session();
            self.emit(SessionEvent::Expired);
            return self.status();
        }

        let (mut user, mut changed) = migrate_user(&user);
        if user.roles.is_empty() {
            match self.inner.auth.profile(&token).await {
                Ok(profile) => {
                    user.roles = canonicalize_roles(&profile.roles);
                    changed = true;
                }
                Err(e) => warn!(error = %e, "Could not fetch roles for stored user"),
            }
            if !self.still_authenticating(generation) {
                return self.status();
            }
        }
        if changed {
            info!(username = %user.username, "Migrated stored user record");
            if let Err(e) = save_json(self.inner.store.as_ref(), keys::CURRENT_USER, &user) {
                warn!(error = %e, "Failed to rewrite stored user");
            }
        }

        self.establish(token, user.clone(), started_at, self.inner.idle_timeout - elapsed);
        info!(
            username = %user.username,
            remaining_secs = (self.inner.idle_timeout - elapsed).as_secs(),
            "Session restored"
        );
        self.emit(SessionEvent::Restored(user));
        SessionStatus::Authenticated
    }

    /// Reset the idle timer. Ignored unless authenticated.
    pub fn record_activity(&self, activity: Activity) {
        let now = self.inner.clock.now_millis();
        let persist = {
            let mut state = lock(&self.inner.state);
            if state.status != SessionStatus::Authenticated {
                return;
            }
            state.started_at = Some(now);
            state.deadline = Some(Instant::now() + self.inner.idle_timeout);
            let due = state
                .persisted_at
                .map_or(true, |at| now - at >= PERSIST_INTERVAL_MS);
            if due {
                state.persisted_at = Some(now);
            }
            due
        };

        trace!(?activity, "Session activity");
        if persist {
            if let Err(e) = self
                .inner
                .store
                .set(keys::SESSION_STARTED_AT, &now.to_string())
            {
                warn!(error = %e, "Failed to persist session activity");
            }
        }
    }

    /// Sign out. Local state is cleared before the server is told.
    pub async fn logout(&self) {
        match self.clear_session() {
            Some(token) => {
                info!("Logged out");
                self.emit(SessionEvent::LoggedOut);
                if let Err(e) = self.inner.auth.logout(&token).await {
                    debug!(error = %e, "Remote logout failed");
                }
            }
            None => debug!("Logout without an active session"),
        }
    }

    /// Drop the session after the server rejected its token
    pub fn invalidate(&self) {
        if self.clear_session().is_some() {
            warn!("Server rejected session token, signing out");
            self.emit(SessionEvent::Invalidated);
        }
    }

    /// Replace the signed-in user's record, e.g. after a profile edit
    pub fn replace_user(&self, user: UserProfile) -> Result<()> {
        let user = user.canonicalized();
        {
            let mut state = lock(&self.inner.state);
            if state.status != SessionStatus::Authenticated {
                return Err(Error::NotAuthenticated);
            }
            state.user = Some(user.clone());
        }
        save_json(self.inner.store.as_ref(), keys::CURRENT_USER, &user)?;
        Ok(())
    }

    /// Cancel the idle timer, leaving stored state alone
    pub fn dispose(&self) {
        lock(&self.inner.state).generation += 1;
        if let Some(handle) = lock(&self.inner.timer).take() {
            handle.abort();
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }

    /// Move to `Authenticating` unless already signed in
    fn begin_authenticating(&self) -> Option<u64> {
        let mut state = lock(&self.inner.state);
        if state.status == SessionStatus::Authenticated {
            return None;
        }
        state.generation += 1;
        state.status = SessionStatus::Authenticating;
        Some(state.generation)
    }

    fn still_authenticating(&self, generation: u64) -> bool {
        let state = lock(&self.inner.state);
        state.generation == generation && state.status == SessionStatus::Authenticating
    }

    fn abandon_authenticating(&self, generation: u64) {
        let mut state = lock(&self.inner.state);
        if state.generation == generation && state.status == SessionStatus::Authenticating {
            state.status = SessionStatus::Anonymous;
        }
    }

    fn read_stored_session(&self) -> Option<(String, UserProfile, i64)> {
        let read = |key: &str| match self.inner.store.get(key) {
            Ok(value) => value.filter(|v| !v.trim().is_empty()),
            Err(e) => {
                warn!(key, error = %e, "Failed to read stored session");
                None
            }
        };
        let token = read(keys::AUTH_TOKEN);
        let user = read(keys::CURRENT_USER);
        let started_at = read(keys::SESSION_STARTED_AT);

        let (token, user) = match (token, user) {
            (Some(token), Some(user)) => (token, user),
            (None, None) if started_at.is_none() => return None,
            _ => {
                debug!("Clearing partial stored session");
                self.clear_session();
                return None;
            }
        };

        let user: UserProfile = match serde_json::from_str(&user) {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable stored user");
                self.clear_session();
                return None;
            }
        };
        let Some(started_at) = started_at.as_deref().and_then(parse_epoch_millis) else {
            warn!("Discarding stored session with unreadable timestamp");
            self.clear_session();
            return None;
        };

        Some((token, user, started_at))
    }

    fn persist_session(&self, token: &str, user: &UserProfile, started_at: i64) {
        let store = self.inner.store.as_ref();
        let result = store
            .set(keys::AUTH_TOKEN, token)
            .and_then(|_| save_json(store, keys::CURRENT_USER, user))
            .and_then(|_| store.set(keys::SESSION_STARTED_AT, &started_at.to_string()));
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist session");
        }
    }

    fn establish(&self, token: String, user: UserProfile, started_at: i64, budget: Duration) {
        self.inner.credentials.set(Some(token.clone()));
        let generation = {
            let mut state = lock(&self.inner.state);
            let generation = state.generation + 1;
            *state = SessionState {
                status: SessionStatus::Authenticated,
                token: Some(token),
                user: Some(user),
                started_at: Some(started_at),
                persisted_at: Some(started_at),
                deadline: Some(Instant::now() + budget),
                generation,
            };
            generation
        };
        self.arm_timer(generation);
    }

    fn arm_timer(&self, generation: u64) {
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            loop {
                let Some(deadline) = weak.upgrade().and_then(|inner| inner.deadline_for(generation))
                else {
                    return;
                };
                tokio::time::sleep_until(deadline).await;

                let Some(inner) = weak.upgrade() else {
                    return;
                };
                // Activity may have pushed the deadline out while we slept
                match inner.deadline_for(generation) {
                    Some(deadline) if deadline <= Instant::now() => {
                        SessionManager { inner }.expire(generation);
                        return;
                    }
                    Some(_) => continue,
                    None => return,
                }
            }
        });

        if let Some(previous) = lock(&self.inner.timer).replace(handle) {
            previous.abort();
        }
    }

    fn expire(&self, generation: u64) {
        {
            let mut state = lock(&self.inner.state);
            if state.generation != generation || state.status != SessionStatus::Authenticated {
                return;
            }
            state.status = SessionStatus::Expired;
        }

        info!("Session expired after inactivity");
        let token = self.clear_session();
        self.emit(SessionEvent::Expired);

        if let Some(token) = token {
            let auth = self.inner.auth.clone();
            tokio::spawn(async move {
                if let Err(e) = auth.logout(&token).await {
                    debug!(error = %e, "Remote logout after expiry failed");
                }
            });
        }
    }

    /// Drop all session state and stored keys. Returns the token that
    /// was held, if any.
    fn clear_session(&self) -> Option<String> {
        let token = {
            let mut state = lock(&self.inner.state);
            let generation = state.generation + 1;
            let token = state.token.take();
            *state = SessionState {
                generation,
                ..SessionState::default()
            };
            token
        };

        if let Some(handle) = lock(&self.inner.timer).take() {
            handle.abort();
        }
        self.inner.credentials.set(None);
        if let Err(e) = self.inner.store.remove_all(keys::SESSION_KEYS) {
            warn!(error = %e, "Failed to clear stored session");
        }
        token
    }
}
