//! Aroma App Library
//!
//! Client-side core of the Aroma catalog admin: session handling with
//! an idle timeout, a locally persisted catalog cache, notifications,
//! and the admin operations built on them.
//!
//! # Usage
//!
//! ```ignore
//! aroma_app::telemetry::init();
//!
//! let config = AppConfig::load("aroma.toml")?;
//! let ctx = AppContext::open(config)?;
//! ctx.init().await;
//!
//! ctx.login("admin", "admin123").await?;
//! ctx.session().record_activity(Activity::Pointer);
//! let perfumes = ctx.catalog().all_perfumes();
//!
//! ctx.dispose();
//! ```

use std::sync::{Mutex, MutexGuard};

pub mod admin;
pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod notify;
pub mod session;
pub mod telemetry;

#[cfg(test)]
mod testing;

pub use admin::ImportOutcome;
pub use catalog::{BatchOutcome, CacheState, CatalogCache};
pub use config::AppConfig;
pub use context::{AppContext, Services};
pub use error::{Error, Result};
pub use notify::{Notification, NotificationHub, NotificationKind};
pub use session::{Activity, Countdown, SessionEvent, SessionManager, SessionStatus};

/// Lock a mutex, recovering the data if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
