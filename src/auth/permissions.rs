/*!
 * # Permissions Module
 *
 * Maps roles to the capabilities they grant. Capabilities are
 * `resource:action` strings; a grant of `resource:*` covers every action on
 * the resource and `*` covers everything.
 *
 * The table is an ordinary value: build it (or take the built-in one), then
 * hand it to a [`PermissionChecker`].
 */

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::warn;

use crate::errors::ServiceError;
use crate::store::Collection;

/// Permission actions
pub struct Actions;

impl Actions {
    pub const READ: &'static str = "read";
    pub const CREATE: &'static str = "create";
    pub const UPDATE: &'static str = "update";
    pub const DELETE: &'static str = "delete";
    pub const CONVERT: &'static str = "convert";
    pub const ALL: &'static str = "*";
}

/// Resource types
pub struct Resources;

impl Resources {
    pub const INVOICES: &'static str = "invoices";
    pub const QUOTATIONS: &'static str = "quotations";
    pub const SALES_ORDERS: &'static str = "sales_orders";
    pub const PROFORMA_INVOICES: &'static str = "proforma_invoices";
    pub const PRODUCTS: &'static str = "products";
    pub const CONTACTS: &'static str = "contacts";
    pub const PAYMENTS: &'static str = "payments";
    pub const REPORTS: &'static str = "reports";
    pub const SETTINGS: &'static str = "settings";
}

/// Common permission string constants
pub mod consts {
    pub const INVOICES_READ: &str = "invoices:read";
    pub const INVOICES_CREATE: &str = "invoices:create";
    pub const INVOICES_UPDATE: &str = "invoices:update";
    pub const INVOICES_DELETE: &str = "invoices:delete";

    pub const QUOTATIONS_READ: &str = "quotations:read";
    pub const QUOTATIONS_CREATE: &str = "quotations:create";
    pub const QUOTATIONS_CONVERT: &str = "quotations:convert";

    pub const SALES_ORDERS_READ: &str = "sales_orders:read";
    pub const SALES_ORDERS_UPDATE: &str = "sales_orders:update";
    pub const SALES_ORDERS_CONVERT: &str = "sales_orders:convert";

    pub const PROFORMA_INVOICES_READ: &str = "proforma_invoices:read";
    pub const PROFORMA_INVOICES_CONVERT: &str = "proforma_invoices:convert";

    pub const PRODUCTS_READ: &str = "products:read";
    pub const PRODUCTS_UPDATE: &str = "products:update";

    pub const SETTINGS_UPDATE: &str = "settings:update";
}

/// Format a permission string
pub fn format_permission(resource: &str, action: &str) -> String {
    format!("{}:{}", resource, action)
}

/// Whether a single grant covers the required capability.
pub fn check_permission(granted: &str, required: &str) -> bool {
    if granted == "*" || granted == required {
        return true;
    }

    match granted.strip_suffix(":*") {
        Some(resource) => required
            .strip_prefix(resource)
            .map_or(false, |rest| rest.starts_with(':')),
        None => false,
    }
}

/// Role name -> granted capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionTable {
    roles: HashMap<String, HashSet<String>>,
}

impl PermissionTable {
    pub fn empty() -> Self {
        Self {
            roles: HashMap::new(),
        }
    }

    pub fn from_grants(grants: HashMap<String, Vec<String>>) -> Self {
        let roles = grants
            .into_iter()
            .map(|(role, caps)| (role.to_lowercase(), caps.into_iter().collect()))
            .collect();
        Self { roles }
    }

    pub fn with_role<I, S>(mut self, role: &str, grants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.insert(
            role.to_lowercase(),
            grants.into_iter().map(Into::into).collect(),
        );
        self
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains_key(&role.to_lowercase())
    }

    /// Whether `role` grants `capability`. Unknown roles grant nothing.
    pub fn grants(&self, role: &str, capability: &str) -> bool {
        self.roles
            .get(&role.to_lowercase())
            .map_or(false, |caps| {
                caps.iter().any(|granted| check_permission(granted, capability))
            })
    }
}

impl Default for PermissionTable {
    fn default() -> Self {
        let all = |resource: &str| format_permission(resource, Actions::ALL);
        let read = |resource: &str| format_permission(resource, Actions::READ);

        Self::empty()
            .with_role("admin", ["*".to_string()])
            .with_role(
                "manager",
                [
                    all(Resources::INVOICES),
                    all(Resources::QUOTATIONS),
                    all(Resources::SALES_ORDERS),
                    all(Resources::PROFORMA_INVOICES),
                    all(Resources::PRODUCTS),
                    all(Resources::CONTACTS),
                    all(Resources::PAYMENTS),
                    read(Resources::REPORTS),
                ],
            )
            .with_role(
                "accountant",
                [
                    all(Resources::INVOICES),
                    all(Resources::PROFORMA_INVOICES),
                    all(Resources::PAYMENTS),
                    read(Resources::QUOTATIONS),
                    read(Resources::SALES_ORDERS),
                    format_permission(Resources::SALES_ORDERS, Actions::CONVERT),
                    read(Resources::CONTACTS),
                    read(Resources::REPORTS),
                ],
            )
            .with_role(
                "sales",
                [
                    all(Resources::QUOTATIONS),
                    all(Resources::SALES_ORDERS),
                    all(Resources::CONTACTS),
                    read(Resources::PROFORMA_INVOICES),
                    format_permission(Resources::PROFORMA_INVOICES, Actions::CREATE),
                    format_permission(Resources::PROFORMA_INVOICES, Actions::UPDATE),
                    read(Resources::INVOICES),
                    read(Resources::PRODUCTS),
                ],
            )
            .with_role(
                "warehouse",
                [
                    all(Resources::PRODUCTS),
                    read(Resources::SALES_ORDERS),
                    format_permission(Resources::SALES_ORDERS, Actions::UPDATE),
                ],
            )
            .with_role(
                "viewer",
                [
                    read(Resources::INVOICES),
                    read(Resources::QUOTATIONS),
                    read(Resources::SALES_ORDERS),
                    read(Resources::PROFORMA_INVOICES),
                    read(Resources::PRODUCTS),
                    read(Resources::CONTACTS),
                ],
            )
    }
}

/// Answers capability questions against an injected table.
#[derive(Debug, Clone)]
pub struct PermissionChecker {
    table: Arc<PermissionTable>,
}

impl PermissionChecker {
    pub fn new(table: PermissionTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    pub fn table(&self) -> &PermissionTable {
        &self.table
    }

    pub fn can(&self, role: &str, capability: &str) -> bool {
        self.table.grants(role, capability)
    }

    pub fn can_on(&self, role: &str, collection: Collection, action: &str) -> bool {
        self.can(role, &format_permission(collection.as_ref(), action))
    }

    pub fn require(&self, role: &str, capability: &str) -> Result<(), ServiceError> {
        if self.can(role, capability) {
            return Ok(());
        }
        if !self.table.has_role(role) {
            warn!(%role, "Permission check for unknown role");
        }
        Err(ServiceError::Forbidden(format!(
            "Role '{}' lacks '{}'",
            role, capability
        )))
    }

    pub fn require_on(
        &self,
        role: &str,
        collection: Collection,
        action: &str,
    ) -> Result<(), ServiceError> {
        self.require(role, &format_permission(collection.as_ref(), action))
    }
}
