//! User models

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::permissions::{canonicalize_roles, Role};

/// The signed-in user, as persisted alongside the auth token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Server-issued roles. Older stored records carry no roles at all.
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl UserProfile {
    pub fn new(username: impl Into<String>, email: Option<String>, roles: BTreeSet<String>) -> Self {
        Self {
            username: username.into(),
            email,
            roles,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(role.as_str())
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// Returns a copy with every role in canonical form
    pub fn canonicalized(&self) -> Self {
        Self {
            username: self.username.clone(),
            email: self.email.clone(),
            roles: canonicalize_roles(&self.roles),
        }
    }
}

/// A user account as listed by the admin user service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Request to create a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: String,
    pub roles: BTreeSet<String>,
}

/// Request to update a user; password is optional
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdate {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub email: String,
    pub roles: BTreeSet<String>,
    pub enabled: bool,
}

/// Request to update the signed-in user's own profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}
