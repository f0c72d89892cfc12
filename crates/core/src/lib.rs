//! Aroma Core Library
//!
//! Catalog and user models, snapshot assembly, validation, import
//! normalization and local persistence for the Aroma catalog client.

pub mod clock;
pub mod error;
pub mod import;
pub mod invariants;
pub mod models;
pub mod permissions;
pub mod snapshot;
pub mod storage;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use import::{ImportReport, ImportRow, QuarantinedRow, RawRow};
pub use models::*;
pub use permissions::{AdminAction, PermissionMatrix, Role};
pub use snapshot::{CatalogSnapshot, CatalogStats, PerfumeFilter};
pub use storage::{keys, KeyValueStore, MemoryStore, SqliteStore};
