//! Role-based capability checks.

pub mod permissions;

pub use permissions::{
    check_permission, consts, format_permission, Actions, PermissionChecker, PermissionTable,
    Resources,
};
