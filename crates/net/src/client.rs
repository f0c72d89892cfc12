//! HTTP client for the remote catalog service

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, PRAGMA};
use reqwest::{multipart, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use aroma_core::{
    BrandRecord, CatalogDraft, CategoryRecord, EntityId, EntityKind, NewUser, PasswordChange,
    PerfumeRecord, ProfileUpdate, UserAccount, UserProfile, UserUpdate,
};

use crate::api::{AuthApi, CatalogApi, Credentials, UploadApi, UserApi};
use crate::error::{Error, Result};
use crate::protocol::{
    AccountEnvelope, ErrorBody, LoginRequest, LoginResponse, ProfileEnvelope, UploadResponse,
    UploadedFile,
};
use crate::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};

/// Which catalog endpoints reads go to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadScope {
    /// Unauthenticated `/public/...` endpoints
    #[default]
    Public,
    /// Authenticated admin endpoints
    Admin,
}

/// Client settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub read_scope: ReadScope,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            read_scope: ReadScope::Public,
        }
    }
}

/// reqwest-backed implementation of every remote contract
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    config: ClientConfig,
    credentials: Credentials,
}

impl HttpClient {
    pub fn new(config: ClientConfig, credentials: Credentials) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            config,
            credentials,
        })
    }

    /// Shared bearer-token slot
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    fn with_bearer(req: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        Self::with_bearer(req, self.credentials.token().as_deref())
    }

    fn read_path(&self, kind: EntityKind) -> String {
        match self.config.read_scope {
            ReadScope::Public => format!("/public/{}", kind.collection()),
            ReadScope::Admin => format!("/{}", kind.collection()),
        }
    }

    /// Send and map non-success statuses to errors
    async fn send(&self, req: RequestBuilder) -> Result<Response> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == StatusCode::UNAUTHORIZED {
            warn!("Server rejected credentials");
            return Err(Error::Unauthorized);
        }

        let body: ErrorBody = resp.json().await.unwrap_or_default();
        let message = body.message.unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });
        debug!(status = status.as_u16(), message = %message, "Request failed");
        Err(Error::Remote {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let req = self.authorized(self.http.get(self.url(path)));
        Ok(self.send(req).await?.json().await?)
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let req = self.authorized(self.http.request(method, self.url(path)).json(body));
        Ok(self.send(req).await?.json().await?)
    }

    async fn send_unit<B: Serialize + ?Sized>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<()> {
        let mut req = self.http.request(method, self.url(path));
        if let Some(body) = body {
            req = req.json(body);
        }
        self.send(self.authorized(req)).await?;
        Ok(())
    }
}

#[async_trait]
impl AuthApi for HttpClient {
    #[instrument(skip(self, password))]
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let req = self.http.post(self.url("/auth/login")).json(&body);
        match self.send(req).await {
            Ok(resp) => Ok(resp.json().await?),
            // The login endpoint answers bad credentials with 400/401
            Err(Error::Unauthorized) => Err(Error::Rejected("Invalid username or password".into())),
            Err(Error::Remote { message, .. }) => Err(Error::Rejected(message)),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip_all)]
    async fn validate_token(&self, token: &str) -> Result<bool> {
        let req = Self::with_bearer(self.http.get(self.url("/auth/validate")), Some(token));
        match self.send(req).await {
            Ok(resp) => Ok(resp.json::<bool>().await?),
            Err(Error::Unauthorized) => Ok(false),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip_all)]
    async fn logout(&self, token: &str) -> Result<()> {
        let req = Self::with_bearer(self.http.post(self.url("/auth/logout")), Some(token));
        self.send(req).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn profile(&self, token: &str) -> Result<UserProfile> {
        let req = Self::with_bearer(self.http.get(self.url("/admin/users/profile")), Some(token));
        Ok(self.send(req).await?.json().await?)
    }
}

#[async_trait]
impl CatalogApi for HttpClient {
    #[instrument(skip(self))]
    async fn categories(&self) -> Result<Vec<CategoryRecord>> {
        self.get_json(&self.read_path(EntityKind::Category)).await
    }

    #[instrument(skip(self))]
    async fn brands(&self) -> Result<Vec<BrandRecord>> {
        self.get_json(&self.read_path(EntityKind::Brand)).await
    }

    #[instrument(skip(self))]
    async fn perfumes(&self) -> Result<Vec<PerfumeRecord>> {
        self.get_json(&self.read_path(EntityKind::Perfume)).await
    }

    #[instrument(skip(self, draft), fields(kind = %draft.kind()))]
    async fn create(&self, draft: &CatalogDraft) -> Result<()> {
        let path = format!("/{}", draft.kind().collection());
        self.send_unit(reqwest::Method::POST, &path, Some(&draft.to_json()?))
            .await
    }

    #[instrument(skip(self, draft), fields(kind = %draft.kind()))]
    async fn update(&self, id: EntityId, draft: &CatalogDraft) -> Result<()> {
        let path = format!("/{}/{}", draft.kind().collection(), id);
        self.send_unit(reqwest::Method::PUT, &path, Some(&draft.to_json()?))
            .await
    }

    #[instrument(skip(self))]
    async fn delete(&self, kind: EntityKind, id: EntityId) -> Result<()> {
        let path = format!("/{}/{}", kind.collection(), id);
        self.send_unit::<()>(reqwest::Method::DELETE, &path, None)
            .await
    }
}

fn check_file_name(filename: &str) -> Result<()> {
    if filename.is_empty() || filename.contains('/') || filename.contains("..") {
        return Err(Error::Rejected(format!("Invalid file name: {}", filename)));
    }
    Ok(())
}

#[async_trait]
impl UploadApi for HttpClient {
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    async fn upload(&self, file_name: &str, content_type: &str, bytes: Vec<u8>) -> Result<UploadedFile> {
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)?;
        let form = multipart::Form::new().part("file", part);

        let req = self.authorized(self.http.post(self.url("/admin/upload")).multipart(form));
        let resp: UploadResponse = self.send(req).await?.json().await?;

        match (resp.success, resp.filename, resp.url) {
            (true, Some(filename), Some(url)) => Ok(UploadedFile { filename, url }),
            (_, _, _) => Err(Error::Rejected(
                resp.message.unwrap_or_else(|| "Upload failed".to_string()),
            )),
        }
    }

    #[instrument(skip(self))]
    async fn delete_file(&self, filename: &str) -> Result<()> {
        check_file_name(filename)?;
        let path = format!("/admin/files/{}", filename);
        self.send_unit::<()>(reqwest::Method::DELETE, &path, None)
            .await
    }

    fn file_url(&self, reference: &str) -> String {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            reference.to_string()
        } else if reference.starts_with('/') {
            self.url(reference)
        } else {
            self.url(&format!("/files/{}", reference))
        }
    }
}

#[async_trait]
impl UserApi for HttpClient {
    #[instrument(skip(self))]
    async fn list_users(&self) -> Result<Vec<UserAccount>> {
        self.get_json("/admin/users").await
    }

    #[instrument(skip(self, user), fields(username = %user.username))]
    async fn create_user(&self, user: &NewUser) -> Result<UserAccount> {
        let envelope: AccountEnvelope = self
            .send_json(reqwest::Method::POST, "/admin/users", user)
            .await?;
        Ok(envelope.user)
    }

    #[instrument(skip(self, user), fields(username = %user.username))]
    async fn update_user(&self, id: i64, user: &UserUpdate) -> Result<UserAccount> {
        let envelope: AccountEnvelope = self
            .send_json(reqwest::Method::PUT, &format!("/admin/users/{}", id), user)
            .await?;
        Ok(envelope.user)
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, id: i64) -> Result<()> {
        self.send_unit::<()>(reqwest::Method::DELETE, &format!("/admin/users/{}", id), None)
            .await
    }

    #[instrument(skip(self))]
    async fn get_profile(&self) -> Result<UserProfile> {
        self.get_json("/admin/users/profile").await
    }

    #[instrument(skip(self, profile))]
    async fn update_profile(&self, profile: &ProfileUpdate) -> Result<UserProfile> {
        let envelope: ProfileEnvelope = self
            .send_json(reqwest::Method::PUT, "/admin/users/profile", profile)
            .await?;
        Ok(envelope.user)
    }

    #[instrument(skip_all)]
    async fn change_password(&self, change: &PasswordChange) -> Result<()> {
        self.send_unit(reqwest::Method::PUT, "/admin/users/change-password", Some(change))
            .await
    }
}
