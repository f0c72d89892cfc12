//! Application context
//!
//! Owns every long-lived component. Construct once, call
//! [`AppContext::init`] at startup and [`AppContext::dispose`] on the
//! way out; nothing here is global.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use aroma_core::{Clock, KeyValueStore, SqliteStore, SystemClock, UserProfile};
use aroma_net::{AuthApi, CatalogApi, Credentials, HttpClient, UploadApi, UserApi};

use crate::catalog::CatalogCache;
use crate::config::AppConfig;
use crate::error::Result;
use crate::lock;
use crate::notify::NotificationHub;
use crate::session::{SessionEvent, SessionManager, SessionStatus};

/// Remote collaborators, plus the token slot they share with the session
#[derive(Clone)]
pub struct Services {
    pub auth: Arc<dyn AuthApi>,
    pub catalog: Arc<dyn CatalogApi>,
    pub uploads: Arc<dyn UploadApi>,
    pub users: Arc<dyn UserApi>,
    pub credentials: Credentials,
}

impl Services {
    /// All four contracts served by one HTTP client
    pub fn http(config: &AppConfig) -> Result<Self> {
        let credentials = Credentials::new();
        let client = Arc::new(HttpClient::new(config.client_config(), credentials.clone())?);
        Ok(Self {
            auth: client.clone(),
            catalog: client.clone(),
            uploads: client.clone(),
            users: client,
            credentials,
        })
    }
}

pub struct AppContext {
    config: AppConfig,
    pub(crate) session: SessionManager,
    pub(crate) catalog: CatalogCache,
    pub(crate) notifications: NotificationHub,
    pub(crate) uploads: Arc<dyn UploadApi>,
    pub(crate) users: Arc<dyn UserApi>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn KeyValueStore>,
        services: Services,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let session = SessionManager::new(
            services.auth,
            store.clone(),
            clock.clone(),
            services.credentials,
            config.idle_timeout(),
        );
        let catalog = CatalogCache::new(services.catalog, store, clock.clone());
        let notifications = NotificationHub::new(clock, config.notification_ttl());

        Self {
            config,
            session,
            catalog,
            notifications,
            uploads: services.uploads,
            users: services.users,
            watcher: Mutex::new(None),
        }
    }

    /// Production wiring: SQLite store, HTTP services, system clock
    pub fn open(config: AppConfig) -> Result<Self> {
        let path = config.resolved_store_path()?;
        let store = SqliteStore::open(&path)?;
        info!(path = %path.display(), "Opened local store");

        let services = Services::http(&config)?;
        Ok(Self::new(config, Arc::new(store), services, Arc::new(SystemClock)))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn catalog(&self) -> &CatalogCache {
        &self.catalog
    }

    pub fn notifications(&self) -> &NotificationHub {
        &self.notifications
    }

    /// Restore the session and load the catalog, concurrently.
    ///
    /// A catalog failure is reported as a notification and left in the
    /// cache state for a retry; it does not fail startup.
    pub async fn init(&self) -> SessionStatus {
        self.watch_session();

        let (status, catalog) = tokio::join!(self.session.restore(), self.catalog.initialize());
        if let Err(e) = catalog {
            self.notifications
                .error("Failed to load catalog", e.user_message());
        }

        info!(?status, stats = ?self.catalog.stats(), "App initialized");
        status
    }

    /// Stop timers and background tasks. Stored state is kept.
    pub fn dispose(&self) {
        if let Some(handle) = lock(&self.watcher).take() {
            handle.abort();
        }
        self.session.dispose();
        self.notifications.dispose();
        debug!("App disposed");
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<UserProfile> {
        match self.session.login(username, password).await {
            Ok(user) => {
                self.notifications
                    .success("Welcome", format!("Signed in as {}", user.username));
                Ok(user)
            }
            Err(e) => {
                self.notifications.error("Login failed", e.user_message());
                Err(e)
            }
        }
    }

    pub async fn logout(&self) {
        self.session.logout().await;
        self.notifications.info("Signed out", "You have been signed out");
    }

    /// Turn involuntary sign-outs into notifications
    fn watch_session(&self) {
        let mut events = self.session.subscribe();
        let notifications = self.notifications.clone();

        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::Expired) => {
                        notifications.warning(
                            "Session expired",
                            "You were signed out after a period of inactivity",
                        );
                    }
                    Ok(SessionEvent::Invalidated) => {
                        notifications.warning(
                            "Signed out",
                            "Your session is no longer valid. Please sign in again.",
                        );
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Session watcher lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        if let Some(previous) = lock(&self.watcher).replace(handle) {
            previous.abort();
        }
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::notify::NotificationKind;
    use crate::testing::{settle, Harness, T0, TOKEN};
    use aroma_core::keys;

    #[tokio::test]
    async fn test_init_restores_session_and_fetches_catalog() {
        let h = Harness::new();
        h.store.set(keys::AUTH_TOKEN, TOKEN).unwrap();
        h.store
            .set(keys::CURRENT_USER, r#"{"username":"admin","roles":["ADMIN"]}"#)
            .unwrap();
        h.store
            .set(keys::SESSION_STARTED_AT, &T0.to_string())
            .unwrap();

        let ctx = h.context();
        assert_eq!(ctx.init().await, SessionStatus::Authenticated);
        assert_eq!(ctx.catalog().stats().perfumes, 1);
        assert_eq!(h.catalog.fetches.load(Ordering::SeqCst), 1);
        assert!(ctx.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_init_reports_catalog_failure() {
        let h = Harness::new();
        h.catalog.fail_perfumes.store(true, Ordering::SeqCst);

        let ctx = h.context();
        assert_eq!(ctx.init().await, SessionStatus::Anonymous);

        let notes = ctx.notifications().list();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::Error);
        assert_eq!(notes[0].message, "Perfume service unavailable");
        assert!(ctx.catalog().state().error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_is_announced() {
        let h = Harness::new();
        let ctx = h.context();
        ctx.init().await;
        ctx.login("admin", "admin123").await.unwrap();

        tokio::time::sleep(ctx.config().idle_timeout() + Duration::from_millis(1)).await;
        settle().await;

        assert!(ctx
            .notifications()
            .list()
            .iter()
            .any(|n| n.title == "Session expired"));
    }

    #[tokio::test]
    async fn test_failed_login_is_reported() {
        let h = Harness::new();
        let ctx = h.context();

        assert!(ctx.login("admin", "nope").await.is_err());
        let notes = ctx.notifications().list();
        assert_eq!(notes[0].title, "Login failed");
        assert_eq!(notes[0].message, "Invalid username or password");
    }

    #[tokio::test]
    async fn test_session_survives_restart_with_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aroma.db");
        let h = Harness::new();

        {
            let store = Arc::new(SqliteStore::open(&path).unwrap());
            let ctx = AppContext::new(AppConfig::default(), store, h.services(), h.clock.clone());
            ctx.init().await;
            ctx.login("admin", "admin123").await.unwrap();
            ctx.dispose();
        }

        let store = Arc::new(SqliteStore::open(&path).unwrap());
        let ctx = AppContext::new(AppConfig::default(), store, h.services(), h.clock.clone());
        assert_eq!(ctx.init().await, SessionStatus::Authenticated);
        assert_eq!(ctx.session().current_user().unwrap().username, "admin");
        // Snapshot came back from disk
        assert_eq!(h.catalog.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_logout_clears_store() {
        let h = Harness::new();
        let ctx = h.context();
        ctx.login("admin", "admin123").await.unwrap();

        ctx.logout().await;
        assert_eq!(h.store.get(keys::AUTH_TOKEN).unwrap(), None);
        assert!(!ctx.session().is_authenticated());
        assert!(ctx
            .notifications()
            .list()
            .iter()
            .any(|n| n.title == "Signed out"));
    }
}
