//! Admin operations
//!
//! Catalog editing, bulk import, image storage and account management.
//! Every operation checks the signed-in user's roles and validates its
//! input before anything goes over the wire, and reports its outcome
//! through the notification hub.

use tracing::{info, warn};

use aroma_core::import::{self, RawRow};
use aroma_core::validation::{
    validate_image_upload, validate_new_user, validate_password_change, validate_profile_update,
    validate_user_update,
};
use aroma_core::{
    AdminAction, EntityKind, ImportReport, Mutation, NewUser, PasswordChange, PermissionMatrix,
    ProfileUpdate, UserAccount, UserProfile, UserUpdate,
};
use aroma_net::UploadedFile;

use crate::catalog::BatchOutcome;
use crate::context::AppContext;
use crate::error::{Error, Result};

/// What a bulk import did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportOutcome {
    /// Rows accepted for sending, and rows quarantined before sending
    pub report: ImportReport,
    /// Result of sending the accepted rows
    pub batch: BatchOutcome,
}

impl AppContext {
    fn authorize(&self, action: AdminAction) -> Result<UserProfile> {
        let user = self.session.current_user().ok_or(Error::NotAuthenticated)?;
        if !PermissionMatrix::can_perform(&user.roles, action) {
            warn!(username = %user.username, ?action, "Action not permitted");
            return Err(Error::PermissionDenied(format!(
                "{} may not perform this action",
                user.username
            )));
        }
        Ok(user)
    }

    /// Report an outcome. A rejected token demotes the session; the
    /// session watcher announces that, so no error toast is added.
    fn finish<T>(
        &self,
        failure: &str,
        result: Result<T>,
        success: impl FnOnce(&T) -> Option<String>,
    ) -> Result<T> {
        match result {
            Ok(value) => {
                if let Some(message) = success(&value) {
                    self.notifications.success("Success", message);
                }
                Ok(value)
            }
            Err(e) if e.is_unauthorized() => {
                self.session.invalidate();
                Err(e)
            }
            Err(e) => {
                let title = match &e {
                    Error::Validation(_) => "Validation error",
                    _ => failure,
                };
                self.notifications.error(title, e.user_message());
                Err(e)
            }
        }
    }

    /// Create, update or delete a catalog entity
    pub async fn save(&self, mutation: Mutation) -> Result<()> {
        let message = format!(
            "{} {} successfully",
            mutation.kind().label(),
            mutation.verb()
        );
        let result = match self.authorize(AdminAction::EditCatalog) {
            Ok(_) => self.catalog.mutate(mutation).await,
            Err(e) => Err(e),
        };
        self.finish("Save failed", result, |_| Some(message))
    }

    /// Import spreadsheet rows for one entity kind
    pub async fn import_rows(&self, kind: EntityKind, rows: &[RawRow]) -> Result<ImportOutcome> {
        let result = match self.authorize(AdminAction::ImportCatalog) {
            Ok(_) => self.run_import(kind, rows).await,
            Err(e) => Err(e),
        };
        let result = self.finish("Import failed", result, |_| None);

        if let Ok(outcome) = &result {
            let sent = outcome.batch.applied;
            let total = outcome.report.accepted.len() + outcome.report.quarantined.len();
            let skipped = total - sent;
            let noun = kind.collection();
            if skipped == 0 && sent > 0 {
                self.notifications
                    .success("Import complete", format!("Imported {} {}", sent, noun));
            } else if sent == 0 {
                self.notifications
                    .warning("Nothing imported", format!("No valid {} found", noun));
            } else {
                self.notifications.warning(
                    "Import finished with problems",
                    format!("Imported {} of {} {}; {} skipped", sent, total, noun, skipped),
                );
            }
        }
        result
    }

    async fn run_import(&self, kind: EntityKind, rows: &[RawRow]) -> Result<ImportOutcome> {
        let report = import::normalize(kind, rows, &self.catalog.snapshot());
        for rejected in &report.quarantined {
            info!(row = rejected.row, reason = %rejected.reason, "Import row quarantined");
        }

        let batch = if report.accepted.is_empty() {
            BatchOutcome::default()
        } else {
            let mutations = report.accepted.iter().cloned().map(Mutation::Create).collect();
            self.catalog.apply_batch(mutations).await?
        };
        Ok(ImportOutcome { report, batch })
    }

    /// Upload an image. The content decides the type, not the name.
    pub async fn upload_image(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadedFile> {
        let result = self.try_upload(file_name, bytes).await;
        self.finish("Upload failed", result, |_| {
            Some("Image uploaded successfully".to_string())
        })
    }

    async fn try_upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadedFile> {
        self.authorize(AdminAction::UploadImages)?;
        let file_name = file_name.trim();
        if file_name.is_empty() {
            return Err(Error::Validation("File name is required".to_string()));
        }
        let content_type = validate_image_upload(&bytes)?;
        let uploaded = self.uploads.upload(file_name, content_type, bytes).await?;
        info!(filename = %uploaded.filename, content_type, "Image uploaded");
        Ok(uploaded)
    }

    pub async fn delete_image(&self, filename: &str) -> Result<()> {
        let result = match self.authorize(AdminAction::UploadImages) {
            Ok(_) => self.uploads.delete_file(filename).await.map_err(Error::from),
            Err(e) => Err(e),
        };
        self.finish("Delete failed", result, |_| {
            Some("Image deleted successfully".to_string())
        })
    }

    /// Resolve a stored image reference to a loadable URL
    pub fn image_url(&self, reference: &str) -> String {
        self.uploads.file_url(reference)
    }

    pub async fn list_users(&self) -> Result<Vec<UserAccount>> {
        let result = match self.authorize(AdminAction::ManageUsers) {
            Ok(_) => self.users.list_users().await.map_err(Error::from),
            Err(e) => Err(e),
        };
        self.finish("Failed to load users", result, |_| None)
    }

    pub async fn create_user(&self, user: NewUser) -> Result<UserAccount> {
        let result = self.try_create_user(&user).await;
        self.finish("Failed to create user", result, |account| {
            Some(format!("User {} created successfully", account.username))
        })
    }

    async fn try_create_user(&self, user: &NewUser) -> Result<UserAccount> {
        self.authorize(AdminAction::ManageUsers)?;
        validate_new_user(user)?;
        Ok(self.users.create_user(user).await?)
    }

    pub async fn update_user(&self, id: i64, user: UserUpdate) -> Result<UserAccount> {
        let result = self.try_update_user(id, &user).await;
        self.finish("Failed to update user", result, |account| {
            Some(format!("User {} updated successfully", account.username))
        })
    }

    async fn try_update_user(&self, id: i64, user: &UserUpdate) -> Result<UserAccount> {
        self.authorize(AdminAction::ManageUsers)?;
        validate_user_update(user)?;
        Ok(self.users.update_user(id, user).await?)
    }

    pub async fn delete_user(&self, id: i64) -> Result<()> {
        let result = match self.authorize(AdminAction::ManageUsers) {
            Ok(_) => self.users.delete_user(id).await.map_err(Error::from),
            Err(e) => Err(e),
        };
        self.finish("Failed to delete user", result, |_| {
            Some("User deleted successfully".to_string())
        })
    }

    /// The signed-in user's profile as the server sees it
    pub async fn profile(&self) -> Result<UserProfile> {
        let result = match self.authorize(AdminAction::EditOwnProfile) {
            Ok(_) => self
                .users
                .get_profile()
                .await
                .map(|profile| profile.canonicalized())
                .map_err(Error::from),
            Err(e) => Err(e),
        };
        self.finish("Failed to load profile", result, |_| None)
    }

    /// Update username and email; the stored session user follows
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<UserProfile> {
        let result = self.try_update_profile(&update).await;
        self.finish("Failed to update profile", result, |_| {
            Some("Profile updated successfully".to_string())
        })
    }

    async fn try_update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile> {
        let current = self.authorize(AdminAction::EditOwnProfile)?;
        validate_profile_update(update)?;

        let mut profile = self.users.update_profile(update).await?.canonicalized();
        if profile.roles.is_empty() {
            profile.roles = current.roles;
        }
        self.session.replace_user(profile.clone())?;
        Ok(profile)
    }

    /// Change the signed-in user's password. `confirmation` must repeat
    /// the new password.
    pub async fn change_password(&self, change: PasswordChange, confirmation: &str) -> Result<()> {
        let result = self.try_change_password(&change, confirmation).await;
        self.finish("Failed to change password", result, |_| {
            Some("Password changed successfully".to_string())
        })
    }

    async fn try_change_password(&self, change: &PasswordChange, confirmation: &str) -> Result<()> {
        self.authorize(AdminAction::EditOwnProfile)?;
        validate_password_change(change, confirmation)?;
        Ok(self.users.change_password(change).await?)
    }
}
