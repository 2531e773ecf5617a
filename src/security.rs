//! # Security Module
//!
//! Permission checks consumed by action allow-lists.
//!
//! An allow-list entry such as `("edit", Access::Permission("CMS_ACCESS"))` is
//! evaluated by asking the [`PermissionChecker`] registered on the dispatch
//! context whether the current user holds that permission code. How users are
//! identified and where grants are stored is up to the host; this module only
//! defines the contract and a static, map-backed implementation.
//!
//! ```rust
//! use director::security::{PermissionChecker, StaticPermissions};
//!
//! let perms = StaticPermissions::new()
//!     .grant("editor", "CMS_ACCESS")
//!     .grant("root", "ADMIN");
//!
//! assert!(perms.check("CMS_ACCESS", Some("editor")));
//! assert!(perms.check("ANYTHING", Some("root")));
//! assert!(!perms.check("CMS_ACCESS", None));
//! ```

use std::collections::{HashMap, HashSet};

/// Code that implies every other permission.
pub const ADMIN_CODE: &str = "ADMIN";

/// Trait for permission-code evaluation.
pub trait PermissionChecker: Send + Sync {
    /// Whether `user` holds permission `code`. Anonymous requests pass `None`.
    fn check(&self, code: &str, user: Option<&str>) -> bool;
}

/// Fixed user → permission-code grants.
#[derive(Debug, Default, Clone)]
pub struct StaticPermissions {
    grants: HashMap<String, HashSet<String>>,
}

impl StaticPermissions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn grant(mut self, user: impl Into<String>, code: impl Into<String>) -> Self {
        self.grants
            .entry(user.into())
            .or_default()
            .insert(code.into());
        self
    }
}

impl PermissionChecker for StaticPermissions {
    fn check(&self, code: &str, user: Option<&str>) -> bool {
        let Some(codes) = user.and_then(|u| self.grants.get(u)) else {
            return false;
        };
        codes.contains(code) || codes.contains(ADMIN_CODE)
    }
}
