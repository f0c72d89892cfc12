//! Input validation
//!
//! Everything here runs before a request leaves the client. A failure
//! is a [`Error::Validation`] carrying a message fit for a toast.

use crate::error::{Error, Result};
use crate::models::{
    BrandDraft, CatalogDraft, CategoryDraft, Mutation, NewUser, PasswordChange, PerfumeDraft,
    ProfileUpdate, UserUpdate,
};

/// Largest image accepted for upload (10MB)
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Image MIME types accepted for upload
pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 50;
const MAX_NAME_LEN: usize = 255;

fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{} is required", field)));
    }
    Ok(())
}

fn entity_name(value: &str, field: &str) -> Result<()> {
    require(value, field)?;
    if value.trim().chars().count() > MAX_NAME_LEN {
        return Err(Error::validation(format!(
            "{} must be at most {} characters",
            field, MAX_NAME_LEN
        )));
    }
    Ok(())
}

fn positive_id(id: i64, field: &str) -> Result<()> {
    if id <= 0 {
        return Err(Error::validation(format!("{} must be selected", field)));
    }
    Ok(())
}

pub fn validate_category(draft: &CategoryDraft) -> Result<()> {
    entity_name(&draft.name, "Category name")
}

pub fn validate_brand(draft: &BrandDraft) -> Result<()> {
    entity_name(&draft.name, "Brand name")?;
    positive_id(draft.category_id, "Category")?;
    if let Some(image) = &draft.image_ref {
        validate_image_ref(image)?;
    }
    Ok(())
}

pub fn validate_perfume(draft: &PerfumeDraft) -> Result<()> {
    entity_name(&draft.name, "Perfume name")?;
    positive_id(draft.brand_id, "Brand")?;
    if let Some(number) = draft.number {
        if number < 0 {
            return Err(Error::validation("Perfume number cannot be negative"));
        }
    }
    Ok(())
}

pub fn validate_draft(draft: &CatalogDraft) -> Result<()> {
    match draft {
        CatalogDraft::Category(d) => validate_category(d),
        CatalogDraft::Brand(d) => validate_brand(d),
        CatalogDraft::Perfume(d) => validate_perfume(d),
    }
}

pub fn validate_mutation(mutation: &Mutation) -> Result<()> {
    match mutation {
        Mutation::Create(draft) => validate_draft(draft),
        Mutation::Update { id, draft } => {
            positive_id(*id, draft.kind().label())?;
            validate_draft(draft)
        }
        Mutation::Delete { kind, id } => positive_id(*id, kind.label()),
    }
}

/// Validate a stored image reference.
///
/// Accepts an absolute `http(s)` URL, a server path such as
/// `/files/x.png`, or a bare file name with an image extension.
/// An empty reference means "no image".
pub fn validate_image_ref(image: &str) -> Result<()> {
    let image = image.trim();
    if image.is_empty() {
        return Ok(());
    }

    if let Some(rest) = image
        .strip_prefix("https://")
        .or_else(|| image.strip_prefix("http://"))
    {
        let host = rest.split('/').next().unwrap_or("");
        if host.is_empty() || image.chars().any(char::is_whitespace) {
            return Err(Error::validation("Image URL is not a valid URL"));
        }
        return Ok(());
    }

    let file_name = image.rsplit('/').next().unwrap_or(image);
    let has_image_extension = file_name
        .rsplit_once('.')
        .map(|(stem, ext)| !stem.is_empty() && IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
    if !has_image_extension || file_name.chars().any(char::is_whitespace) {
        return Err(Error::validation(
            "Image must be a URL or an image file name (JPEG, PNG, GIF, WebP)",
        ));
    }
    Ok(())
}

/// Sniff image bytes and enforce the upload constraints.
///
/// Returns the detected MIME type. The declared type from the caller is
/// not trusted; content decides.
pub fn validate_image_upload(bytes: &[u8]) -> Result<&'static str> {
    if bytes.is_empty() {
        return Err(Error::validation("No file selected"));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(Error::validation("File size must be less than 10MB"));
    }

    let mime = infer::get(bytes)
        .map(|kind| kind.mime_type())
        .filter(|mime| ALLOWED_IMAGE_TYPES.contains(mime))
        .ok_or_else(|| Error::validation("Only image files (JPEG, PNG, GIF, WebP) are allowed"))?;
    Ok(mime)
}

pub fn validate_username(username: &str) -> Result<()> {
    require(username, "Username")?;
    let len = username.trim().chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(Error::validation(format!(
            "Username must be between {} and {} characters",
            MIN_USERNAME_LEN, MAX_USERNAME_LEN
        )));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<()> {
    require(email, "Email")?;
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(Error::validation("Email should be valid"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(Error::validation("Password is required"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn validate_roles(roles: &std::collections::BTreeSet<String>) -> Result<()> {
    if roles.is_empty() {
        return Err(Error::validation("At least one role must be selected"));
    }
    Ok(())
}

pub fn validate_new_user(user: &NewUser) -> Result<()> {
    validate_username(&user.username)?;
    validate_email(&user.email)?;
    validate_password(&user.password)?;
    validate_roles(&user.roles)
}

pub fn validate_user_update(user: &UserUpdate) -> Result<()> {
    validate_username(&user.username)?;
    validate_email(&user.email)?;
    if let Some(password) = &user.password {
        validate_password(password)?;
    }
    validate_roles(&user.roles)
}

pub fn validate_profile_update(profile: &ProfileUpdate) -> Result<()> {
    validate_username(&profile.username)?;
    validate_email(&profile.email)
}

/// Validate a password change, including the confirmation field
pub fn validate_password_change(change: &PasswordChange, confirmation: &str) -> Result<()> {
    if change.current_password.is_empty() {
        return Err(Error::validation("Current password is required"));
    }
    if change.new_password.is_empty() {
        return Err(Error::validation("New password is required"));
    }
    validate_password(&change.new_password)?;
    if change.new_password != confirmation {
        return Err(Error::validation("Passwords do not match"));
    }
    if change.new_password == change.current_password {
        return Err(Error::validation(
            "New password must differ from the current password",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityKind;

    const PNG_HEADER: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    fn message(result: Result<()>) -> String {
        match result {
            Err(Error::Validation(msg)) => msg,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_category_name_required() {
        let draft = CategoryDraft {
            name: "   ".to_string(),
            description: None,
            color: None,
        };
        assert_eq!(message(validate_category(&draft)), "Category name is required");
    }

    #[test]
    fn test_brand_requires_category() {
        let draft = BrandDraft {
            name: "Dior".to_string(),
            description: None,
            category_id: 0,
            image_ref: None,
        };
        assert_eq!(message(validate_brand(&draft)), "Category must be selected");
    }

    #[test]
    fn test_image_refs() {
        assert!(validate_image_ref("").is_ok());
        assert!(validate_image_ref("https://cdn.example.com/dior.png").is_ok());
        assert!(validate_image_ref("/files/3f2a.webp").is_ok());
        assert!(validate_image_ref("dior.JPG").is_ok());
        assert!(validate_image_ref("https://").is_err());
        assert!(validate_image_ref("notes.txt").is_err());
        assert!(validate_image_ref("my logo.png").is_err());
        assert!(validate_image_ref(".png").is_err());
    }

    #[test]
    fn test_delete_requires_id() {
        let mutation = Mutation::Delete {
            kind: EntityKind::Brand,
            id: -1,
        };
        assert_eq!(message(validate_mutation(&mutation)), "Brand must be selected");
    }

    #[test]
    fn test_image_upload_sniffing() {
        assert_eq!(validate_image_upload(PNG_HEADER).unwrap(), "image/png");
        assert!(validate_image_upload(b"%PDF-1.7 not an image").is_err());
        assert!(validate_image_upload(&[]).is_err());

        let mut oversized = PNG_HEADER.to_vec();
        oversized.resize(MAX_IMAGE_BYTES + 1, 0);
        assert!(validate_image_upload(&oversized).is_err());
    }

    #[test]
    fn test_user_rules() {
        assert!(validate_username("ab").is_err());
        assert!(validate_username("abc").is_ok());
        assert!(validate_email("ops@example.com").is_ok());
        assert!(validate_email("ops@localhost").is_err());
        assert!(validate_email("no-at.example.com").is_err());
        assert!(validate_password("12345").is_err());

        let user = NewUser {
            username: "curator".to_string(),
            password: "secret1".to_string(),
            email: "curator@example.com".to_string(),
            roles: Default::default(),
        };
        assert_eq!(
            message(validate_new_user(&user)),
            "At least one role must be selected"
        );
    }

    #[test]
    fn test_password_change() {
        let change = PasswordChange {
            current_password: "old-secret".to_string(),
            new_password: "new-secret".to_string(),
        };
        assert!(validate_password_change(&change, "new-secret").is_ok());
        assert_eq!(
            message(validate_password_change(&change, "other")),
            "Passwords do not match"
        );

        let short = PasswordChange {
            current_password: "old-secret".to_string(),
            new_password: "abc".to_string(),
        };
        assert!(validate_password_change(&short, "abc").is_err());
    }
}
