//! Roles and the permission matrix for admin operations
//!
//! Roles are issued by the server. Older clients stored them with a
//! `ROLE_` prefix; the canonical form is the bare upper-case name.

use std::collections::BTreeSet;

use crate::models::UserProfile;

/// Prefix used by the legacy role naming convention
pub const LEGACY_ROLE_PREFIX: &str = "ROLE_";

/// Roles understood by the admin surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

/// Canonical form of a single role string
pub fn canonicalize_role(role: &str) -> String {
    let upper = role.trim().to_ascii_uppercase();
    match upper.strip_prefix(LEGACY_ROLE_PREFIX) {
        Some(bare) => bare.to_string(),
        None => upper,
    }
}

/// Canonical form of a role set. Empty entries are dropped.
pub fn canonicalize_roles(roles: &BTreeSet<String>) -> BTreeSet<String> {
    roles
        .iter()
        .map(|r| canonicalize_role(r))
        .filter(|r| !r.is_empty())
        .collect()
}

/// Migrate a stored user record to canonical roles.
///
/// Returns the migrated record and whether anything changed, so the
/// caller only rewrites the store when needed.
pub fn migrate_user(user: &UserProfile) -> (UserProfile, bool) {
    let migrated = user.canonicalized();
    let changed = migrated.roles != user.roles;
    (migrated, changed)
}

/// Admin actions gated by role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    // Catalog
    EditCatalog,
    ImportCatalog,
    UploadImages,

    // Accounts
    EditOwnProfile,
    ManageUsers,
}

/// Permission matrix for admin roles
pub struct PermissionMatrix;

impl PermissionMatrix {
    /// Check if a role set grants an action
    pub fn can_perform(roles: &BTreeSet<String>, action: AdminAction) -> bool {
        let has = |role: Role| roles.contains(role.as_str());
        match action {
            // Any signed-in user can curate the catalog
            AdminAction::EditCatalog | AdminAction::ImportCatalog | AdminAction::UploadImages => {
                has(Role::User) || has(Role::Admin)
            }
            AdminAction::EditOwnProfile => has(Role::User) || has(Role::Admin),

            // Account management - Admin only
            AdminAction::ManageUsers => has(Role::Admin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_canonicalize_role() {
        assert_eq!(canonicalize_role("ROLE_ADMIN"), "ADMIN");
        assert_eq!(canonicalize_role("role_user"), "USER");
        assert_eq!(canonicalize_role(" ADMIN "), "ADMIN");
    }

    #[test]
    fn test_migration_is_idempotent() {
        let user = UserProfile::new("legacy", None, roles(&["ROLE_ADMIN", "ROLE_USER", "USER"]));

        let (once, changed_once) = migrate_user(&user);
        let (twice, changed_twice) = migrate_user(&once);

        assert!(changed_once);
        assert!(!changed_twice);
        assert_eq!(once, twice);
        assert_eq!(once.roles, roles(&["ADMIN", "USER"]));
    }

    #[test]
    fn test_migration_leaves_canonical_untouched() {
        let user = UserProfile::new("ops", None, roles(&["USER"]));
        let (migrated, changed) = migrate_user(&user);
        assert!(!changed);
        assert_eq!(migrated, user);
    }

    #[test]
    fn test_admin_permissions() {
        let admin = roles(&["ADMIN"]);
        assert!(PermissionMatrix::can_perform(&admin, AdminAction::ManageUsers));
        assert!(PermissionMatrix::can_perform(&admin, AdminAction::EditCatalog));
    }

    #[test]
    fn test_user_permissions() {
        let user = roles(&["USER"]);
        assert!(PermissionMatrix::can_perform(&user, AdminAction::EditCatalog));
        assert!(!PermissionMatrix::can_perform(&user, AdminAction::ManageUsers));
        assert!(!PermissionMatrix::can_perform(&BTreeSet::new(), AdminAction::UploadImages));
    }
}
