//! Capability checks
//!
//! Every role or ownership decision goes through [`authorize`], so the rules
//! live in one place instead of being repeated in each middleware.

use crate::models::UserRole;

/// The verified caller of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub role: UserRole,
}

impl Principal {
    pub fn new(user_id: impl Into<String>, role: UserRole) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// What an operation requires of its caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission<'a> {
    /// Caller must be an admin
    Admin,
    /// Caller must be an admin or the creator of the resource
    AdminOrOwner { owner_id: &'a str },
    /// Caller must be the user the acting session belongs to
    SessionOwner { session_user_id: Option<&'a str> },
}

/// Denied permission, with the message shown to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    #[error("Forbidden: Admins only")]
    NotAdmin,
    #[error("Forbidden: Admins or owners only")]
    NotOwner,
    #[error("Forbidden: this is not your profile")]
    NotSelf,
}

/// Decide whether `principal` holds `permission`.
pub fn authorize(principal: &Principal, permission: Permission<'_>) -> Result<(), AccessDenied> {
    match permission {
        Permission::Admin if principal.is_admin() => Ok(()),
        Permission::Admin => Err(AccessDenied::NotAdmin),
        Permission::AdminOrOwner { owner_id } => {
            if principal.is_admin() || principal.user_id == owner_id {
                Ok(())
            } else {
                Err(AccessDenied::NotOwner)
            }
        }
        // Admins get no bypass: this guards "act as myself" routes.
        Permission::SessionOwner { session_user_id } => match session_user_id {
            Some(id) if id == principal.user_id => Ok(()),
            _ => Err(AccessDenied::NotSelf),
        },
    }
}
