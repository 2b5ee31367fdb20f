//! Role authorization gate.
//!
//! One declarative table decides which roles may invoke an action and which of
//! those roles must also be the record's assignee. ADMIN passes every check and
//! is never bound to an assignee. Inactive principals are denied everything.

use crate::error::WorkflowError;
use crate::types::{Principal, Role};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    CreateGateEntry,
    ListGateEntries,
    ViewOfficerQueue,
    DecideStageOne,
    ViewStoreQueue,
    ProcessStoreEntry,
    UpdateStoreEntry,
    ViewInwardDetail,
    DecideFinal,
    RequestIssue,
    DecideIssue,
    ViewIssueHistory,
    ViewReceipt,
    ViewStoreInventory,
    ViewMaterials,
    ViewStockLedger,
    CreateMaterial,
    AdjustStock,
    ListOfficers,
    ManageUsers,
}

impl Action {
    pub const ALL: [Action; 20] = [
        Action::CreateGateEntry,
        Action::ListGateEntries,
        Action::ViewOfficerQueue,
        Action::DecideStageOne,
        Action::ViewStoreQueue,
        Action::ProcessStoreEntry,
        Action::UpdateStoreEntry,
        Action::ViewInwardDetail,
        Action::DecideFinal,
        Action::RequestIssue,
        Action::DecideIssue,
        Action::ViewIssueHistory,
        Action::ViewReceipt,
        Action::ViewStoreInventory,
        Action::ViewMaterials,
        Action::ViewStockLedger,
        Action::CreateMaterial,
        Action::AdjustStock,
        Action::ListOfficers,
        Action::ManageUsers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::CreateGateEntry => "create gate entries",
            Action::ListGateEntries => "list gate entries",
            Action::ViewOfficerQueue => "view officer approval queues",
            Action::DecideStageOne => "decide stage-1 approvals",
            Action::ViewStoreQueue => "view the store verification queue",
            Action::ProcessStoreEntry => "process store entries",
            Action::UpdateStoreEntry => "edit processed store entries",
            Action::ViewInwardDetail => "view inward details",
            Action::DecideFinal => "decide final approvals",
            Action::RequestIssue => "request material issues",
            Action::DecideIssue => "decide material issues",
            Action::ViewIssueHistory => "view issue history",
            Action::ViewReceipt => "view issue receipts",
            Action::ViewStoreInventory => "view store inventory",
            Action::ViewMaterials => "view materials",
            Action::ViewStockLedger => "view the stock ledger",
            Action::CreateMaterial => "create materials",
            Action::AdjustStock => "adjust stock",
            Action::ListOfficers => "list officers",
            Action::ManageUsers => "manage users",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the gate refused a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    Inactive,
    Role(Role),
    NotAssignee,
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denial::Inactive => f.write_str("account is inactive"),
            Denial::Role(role) => write!(f, "role {role} is not permitted"),
            Denial::NotAssignee => f.write_str("record is assigned to another officer"),
        }
    }
}

struct Permission {
    action: Action,
    roles: &'static [Role],
    // roles that must additionally be the record's assignee
    assignee_roles: &'static [Role],
}

const OFFICER: &[Role] = &[Role::Officer];
const STORE: &[Role] = &[Role::StoreManager];
const SECURITY: &[Role] = &[Role::Security];
const OFFICER_OR_STORE: &[Role] = &[Role::Officer, Role::StoreManager];
const ADMIN_ONLY: &[Role] = &[];
const UNBOUND: &[Role] = &[];

const PERMISSIONS: &[Permission] = &[
    Permission { action: Action::CreateGateEntry, roles: SECURITY, assignee_roles: UNBOUND },
    Permission { action: Action::ListGateEntries, roles: SECURITY, assignee_roles: UNBOUND },
    Permission { action: Action::ViewOfficerQueue, roles: OFFICER, assignee_roles: UNBOUND },
    Permission { action: Action::DecideStageOne, roles: OFFICER, assignee_roles: OFFICER },
    Permission { action: Action::ViewStoreQueue, roles: STORE, assignee_roles: UNBOUND },
    Permission { action: Action::ProcessStoreEntry, roles: STORE, assignee_roles: UNBOUND },
    Permission { action: Action::UpdateStoreEntry, roles: STORE, assignee_roles: UNBOUND },
    Permission { action: Action::ViewInwardDetail, roles: OFFICER_OR_STORE, assignee_roles: OFFICER },
    Permission { action: Action::DecideFinal, roles: OFFICER, assignee_roles: OFFICER },
    Permission { action: Action::RequestIssue, roles: STORE, assignee_roles: UNBOUND },
    Permission { action: Action::DecideIssue, roles: OFFICER, assignee_roles: OFFICER },
    Permission { action: Action::ViewIssueHistory, roles: OFFICER_OR_STORE, assignee_roles: UNBOUND },
    Permission { action: Action::ViewReceipt, roles: OFFICER_OR_STORE, assignee_roles: OFFICER },
    Permission { action: Action::ViewStoreInventory, roles: OFFICER_OR_STORE, assignee_roles: UNBOUND },
    Permission { action: Action::ViewMaterials, roles: OFFICER_OR_STORE, assignee_roles: UNBOUND },
    Permission { action: Action::ViewStockLedger, roles: OFFICER_OR_STORE, assignee_roles: UNBOUND },
    Permission { action: Action::CreateMaterial, roles: STORE, assignee_roles: UNBOUND },
    Permission { action: Action::AdjustStock, roles: ADMIN_ONLY, assignee_roles: UNBOUND },
    Permission { action: Action::ListOfficers, roles: &[Role::Security, Role::StoreManager], assignee_roles: UNBOUND },
    Permission { action: Action::ManageUsers, roles: ADMIN_ONLY, assignee_roles: UNBOUND },
];

fn permission(action: Action) -> Option<&'static Permission> {
    PERMISSIONS.iter().find(|p| p.action == action)
}

/// Whether `role` may invoke `action` at all, ignoring assignment.
pub fn permits(role: Role, action: Action) -> bool {
    role == Role::Admin || permission(action).is_some_and(|p| p.roles.contains(&role))
}

fn denied(principal: &Principal, action: Action, reason: Denial) -> WorkflowError {
    log::warn!("denied {} ({}) to {action}: {reason}", principal.username, principal.role);
    WorkflowError::AuthorizationDenied {
        username: principal.username.clone(),
        action,
        reason,
    }
}

/// Role level check, run before any record is read.
pub fn authorize(principal: &Principal, action: Action) -> Result<(), WorkflowError> {
    if !principal.active {
        return Err(denied(principal, action, Denial::Inactive));
    }
    if !permits(principal.role, action) {
        return Err(denied(principal, action, Denial::Role(principal.role)));
    }
    Ok(())
}

/// Role check plus identity equality for roles bound to the record's assignee.
pub fn authorize_assignee(
    principal: &Principal,
    action: Action,
    assignee_id: &str,
) -> Result<(), WorkflowError> {
    authorize(principal, action)?;
    if principal.role == Role::Admin {
        return Ok(());
    }
    let bound = permission(action).is_some_and(|p| p.assignee_roles.contains(&principal.role));
    if bound && principal.id != assignee_id {
        return Err(denied(principal, action, Denial::NotAssignee));
    }
    Ok(())
}
