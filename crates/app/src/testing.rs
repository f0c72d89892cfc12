//! In-memory stand-ins for the remote service

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use aroma_core::{
    BrandRecord, CatalogDraft, CategoryRecord, EntityId, EntityKind, ManualClock, MemoryStore,
    NewUser, PasswordChange, PerfumeRecord, ProfileUpdate, UserAccount, UserProfile, UserUpdate,
};
use aroma_net::{
    AuthApi, CatalogApi, Credentials, Error, LoginResponse, Result, UploadApi, UploadedFile,
    UserApi,
};

use crate::config::AppConfig;
use crate::context::{AppContext, Services};

pub const TOKEN: &str = "T1";

/// Epoch millis used as "now" by test clocks
pub const T0: i64 = 1_700_000_000_000;

pub fn roles(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Let spawned tasks run to their next await point
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

pub struct StubAuth {
    pub token_valid: AtomicBool,
    pub login_roles: Mutex<Option<BTreeSet<String>>>,
    pub profile_roles: Mutex<BTreeSet<String>>,
    pub logouts: Mutex<Vec<String>>,
    pub validations: AtomicUsize,
    pub profile_calls: AtomicUsize,
    pub login_latency: Mutex<Option<Duration>>,
}

impl Default for StubAuth {
    fn default() -> Self {
        Self {
            token_valid: AtomicBool::new(true),
            login_roles: Mutex::new(Some(roles(&["ADMIN"]))),
            profile_roles: Mutex::new(roles(&["ADMIN"])),
            logouts: Mutex::new(Vec::new()),
            validations: AtomicUsize::new(0),
            profile_calls: AtomicUsize::new(0),
            login_latency: Mutex::new(None),
        }
    }
}

impl StubAuth {
    pub fn logouts(&self) -> Vec<String> {
        self.logouts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthApi for StubAuth {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let latency = *self.login_latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if username == "admin" && password == "admin123" {
            Ok(LoginResponse {
                token: TOKEN.to_string(),
                username: username.to_string(),
                email: Some("admin@example.com".to_string()),
                roles: self.login_roles.lock().unwrap().clone(),
                message: Some("Login successful".to_string()),
            })
        } else {
            Err(Error::Rejected("Invalid username or password".to_string()))
        }
    }

    async fn validate_token(&self, _token: &str) -> Result<bool> {
        self.validations.fetch_add(1, Ordering::SeqCst);
        Ok(self.token_valid.load(Ordering::SeqCst))
    }

    async fn logout(&self, token: &str) -> Result<()> {
        self.logouts.lock().unwrap().push(token.to_string());
        Ok(())
    }

    async fn profile(&self, _token: &str) -> Result<UserProfile> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        Ok(UserProfile::new(
            "admin",
            Some("admin@example.com".to_string()),
            self.profile_roles.lock().unwrap().clone(),
        ))
    }
}

#[derive(Default)]
struct CatalogRows {
    categories: Vec<CategoryRecord>,
    brands: Vec<BrandRecord>,
    perfumes: Vec<PerfumeRecord>,
    next_id: EntityId,
}

/// Catalog service backed by three vectors. Writes change what later
/// reads return, like the real service.
#[derive(Default)]
pub struct StubCatalog {
    rows: Mutex<CatalogRows>,
    pub fail_perfumes: AtomicBool,
    pub fail_writes: AtomicBool,
    pub reject_token: AtomicBool,
    pub fetches: AtomicUsize,
    pub writes: AtomicUsize,
    /// Delay applied to every read
    pub latency: Mutex<Option<Duration>>,
}

impl StubCatalog {
    /// Men -> Dior -> Sauvage, plus an orphaned brand and perfume
    pub fn seeded() -> Self {
        let stub = Self::default();
        {
            let mut rows = stub.rows.lock().unwrap();
            rows.categories = vec![CategoryRecord {
                id: 1,
                name: "Men".to_string(),
                description: None,
                color: Some("blue".to_string()),
            }];
            rows.brands = vec![
                BrandRecord {
                    id: 10,
                    name: "Dior".to_string(),
                    description: None,
                    category_id: 1,
                    image_ref: None,
                },
                BrandRecord {
                    id: 11,
                    name: "Nowhere".to_string(),
                    description: None,
                    category_id: 99,
                    image_ref: None,
                },
            ];
            rows.perfumes = vec![
                PerfumeRecord {
                    id: 100,
                    name: "Sauvage".to_string(),
                    number: Some(112),
                    brand_id: 10,
                },
                PerfumeRecord {
                    id: 101,
                    name: "Lost".to_string(),
                    number: None,
                    brand_id: 77,
                },
            ];
            rows.next_id = 1000;
        }
        stub
    }

    fn fetched(&self) -> Result<()> {
        if self.reject_token.load(Ordering::SeqCst) {
            return Err(Error::Unauthorized);
        }
        Ok(())
    }

    async fn delay(&self) {
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn write_allowed(&self) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.reject_token.load(Ordering::SeqCst) {
            return Err(Error::Unauthorized);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Remote {
                status: 500,
                message: "Server error".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogApi for StubCatalog {
    async fn categories(&self) -> Result<Vec<CategoryRecord>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.fetched()?;
        Ok(self.rows.lock().unwrap().categories.clone())
    }

    async fn brands(&self) -> Result<Vec<BrandRecord>> {
        self.delay().await;
        self.fetched()?;
        Ok(self.rows.lock().unwrap().brands.clone())
    }

    async fn perfumes(&self) -> Result<Vec<PerfumeRecord>> {
        self.delay().await;
        self.fetched()?;
        if self.fail_perfumes.load(Ordering::SeqCst) {
            return Err(Error::Remote {
                status: 500,
                message: "Perfume service unavailable".to_string(),
            });
        }
        Ok(self.rows.lock().unwrap().perfumes.clone())
    }

    async fn create(&self, draft: &CatalogDraft) -> Result<()> {
        self.write_allowed()?;
        let mut rows = self.rows.lock().unwrap();
        rows.next_id += 1;
        let id = rows.next_id;
        match draft.clone() {
            CatalogDraft::Category(d) => rows.categories.push(CategoryRecord {
                id,
                name: d.name,
                description: d.description,
                color: d.color,
            }),
            CatalogDraft::Brand(d) => rows.brands.push(BrandRecord {
                id,
                name: d.name,
                description: d.description,
                category_id: d.category_id,
                image_ref: d.image_ref,
            }),
            CatalogDraft::Perfume(d) => rows.perfumes.push(PerfumeRecord {
                id,
                name: d.name,
                number: d.number,
                brand_id: d.brand_id,
            }),
        }
        Ok(())
    }

    async fn update(&self, id: EntityId, draft: &CatalogDraft) -> Result<()> {
        self.write_allowed()?;
        let mut rows = self.rows.lock().unwrap();
        let found = match draft {
            CatalogDraft::Category(d) => rows.categories.iter_mut().find(|r| r.id == id).map(|r| {
                r.name = d.name.clone();
                r.description = d.description.clone();
                r.color = d.color.clone();
            }),
            CatalogDraft::Brand(d) => rows.brands.iter_mut().find(|r| r.id == id).map(|r| {
                r.name = d.name.clone();
                r.description = d.description.clone();
                r.category_id = d.category_id;
                r.image_ref = d.image_ref.clone();
            }),
            CatalogDraft::Perfume(d) => rows.perfumes.iter_mut().find(|r| r.id == id).map(|r| {
                r.name = d.name.clone();
                r.number = d.number;
                r.brand_id = d.brand_id;
            }),
        };
        found.ok_or_else(|| Error::Remote {
            status: 404,
            message: format!("{} not found", draft.kind().label()),
        })
    }

    async fn delete(&self, kind: EntityKind, id: EntityId) -> Result<()> {
        self.write_allowed()?;
        let mut rows = self.rows.lock().unwrap();
        match kind {
            EntityKind::Category => rows.categories.retain(|r| r.id != id),
            EntityKind::Brand => rows.brands.retain(|r| r.id != id),
            EntityKind::Perfume => rows.perfumes.retain(|r| r.id != id),
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct StubUploads {
    pub uploaded: Mutex<Vec<(String, String, usize)>>,
    pub deleted: Mutex<Vec<String>>,
}

#[async_trait]
impl UploadApi for StubUploads {
    async fn upload(&self, file_name: &str, content_type: &str, bytes: Vec<u8>) -> Result<UploadedFile> {
        self.uploaded
            .lock()
            .unwrap()
            .push((file_name.to_string(), content_type.to_string(), bytes.len()));
        Ok(UploadedFile {
            filename: format!("u-{}", file_name),
            url: format!("/files/u-{}", file_name),
        })
    }

    async fn delete_file(&self, filename: &str) -> Result<()> {
        self.deleted.lock().unwrap().push(filename.to_string());
        Ok(())
    }

    fn file_url(&self, reference: &str) -> String {
        if reference.starts_with("http") {
            reference.to_string()
        } else {
            format!("http://stub/api/files/{}", reference.trim_start_matches("/files/"))
        }
    }
}

#[derive(Default)]
pub struct StubUsers {
    pub accounts: Mutex<Vec<UserAccount>>,
    pub password_changes: AtomicUsize,
    pub reject_token: AtomicBool,
}

impl StubUsers {
    fn check(&self) -> Result<()> {
        if self.reject_token.load(Ordering::SeqCst) {
            return Err(Error::Unauthorized);
        }
        Ok(())
    }
}

#[async_trait]
impl UserApi for StubUsers {
    async fn list_users(&self) -> Result<Vec<UserAccount>> {
        self.check()?;
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn create_user(&self, user: &NewUser) -> Result<UserAccount> {
        self.check()?;
        let mut accounts = self.accounts.lock().unwrap();
        let account = UserAccount {
            id: accounts.len() as i64 + 1,
            username: user.username.clone(),
            email: Some(user.email.clone()),
            roles: user.roles.clone(),
            enabled: true,
        };
        accounts.push(account.clone());
        Ok(account)
    }

    async fn update_user(&self, id: i64, user: &UserUpdate) -> Result<UserAccount> {
        self.check()?;
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::Remote {
                status: 404,
                message: "User not found".to_string(),
            })?;
        account.username = user.username.clone();
        account.email = Some(user.email.clone());
        account.roles = user.roles.clone();
        account.enabled = user.enabled;
        Ok(account.clone())
    }

    async fn delete_user(&self, id: i64) -> Result<()> {
        self.check()?;
        self.accounts.lock().unwrap().retain(|a| a.id != id);
        Ok(())
    }

    async fn get_profile(&self) -> Result<UserProfile> {
        self.check()?;
        Ok(UserProfile::new("admin", None, roles(&["ADMIN"])))
    }

    async fn update_profile(&self, profile: &ProfileUpdate) -> Result<UserProfile> {
        self.check()?;
        Ok(UserProfile::new(
            profile.username.clone(),
            Some(profile.email.clone()),
            roles(&["ROLE_ADMIN"]),
        ))
    }

    async fn change_password(&self, _change: &PasswordChange) -> Result<()> {
        self.check()?;
        self.password_changes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Every stub, kept typed so tests can inspect and steer them
pub struct Harness {
    pub auth: Arc<StubAuth>,
    pub catalog: Arc<StubCatalog>,
    pub uploads: Arc<StubUploads>,
    pub users: Arc<StubUsers>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub credentials: Credentials,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            auth: Arc::new(StubAuth::default()),
            catalog: Arc::new(StubCatalog::seeded()),
            uploads: Arc::new(StubUploads::default()),
            users: Arc::new(StubUsers::default()),
            store: Arc::new(MemoryStore::new()),
            clock: Arc::new(ManualClock::new(T0)),
            credentials: Credentials::new(),
        }
    }

    pub fn services(&self) -> Services {
        Services {
            auth: self.auth.clone(),
            catalog: self.catalog.clone(),
            uploads: self.uploads.clone(),
            users: self.users.clone(),
            credentials: self.credentials.clone(),
        }
    }

    pub fn context(&self) -> AppContext {
        AppContext::new(
            AppConfig::default(),
            self.store.clone(),
            self.services(),
            self.clock.clone(),
        )
    }
}
