//! Read-only, role-filtered projections over the ledger.
use crate::auth::{self, Action};
use crate::error::WorkflowError;
use crate::model::{
    GateEntry, GateEntryStatus, InventoryLog, InwardProcess, IssueStatus, Material, MaterialIssue,
    User,
};
use crate::types::{Principal, Role, TimeStamp};
use crate::workflow::IntakeService;
use chrono::Utc;
use std::collections::HashMap;
use std::fmt;

/// One finally approved inward item as it sits in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreItemView {
    pub item_id: String,
    pub gate_pass_number: String,
    pub material_id: Option<String>,
    pub material_code: Option<String>,
    pub material_name: String,
    pub category: String,
    pub unit: String,
    pub quantity: u64,
    pub store_room: Option<String>,
    pub rack_no: Option<String>,
    pub shelf_no: Option<String>,
    pub inward_date: Option<TimeStamp<Utc>>,
    // only shown to store managers and admins
    pub officer_name: Option<String>,
}

impl StoreItemView {
    pub fn location(&self) -> String {
        match &self.store_room {
            Some(room) => format!(
                "{room} / {} / {}",
                self.rack_no.as_deref().unwrap_or("-"),
                self.shelf_no.as_deref().unwrap_or("-")
            ),
            None => "-".to_string(),
        }
    }
}

/// Printable issue note for an approved issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueReceipt {
    pub issue_note_id: String,
    pub issue_id: String,
    pub material_name: String,
    pub material_code: String,
    pub unit: String,
    pub quantity_requested: u64,
    pub quantity_issued: u64,
    pub purpose: String,
    pub requesting_dept: String,
    pub requested_by: String,
    pub approved_by: String,
    pub approved_at: TimeStamp<Utc>,
}

impl fmt::Display for IssueReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MATERIAL ISSUE NOTE")?;
        writeln!(f, "===================")?;
        writeln!(f, "Issue Note No : {}", self.issue_note_id)?;
        writeln!(f, "Issue Ref     : ISS-{}", self.issue_id)?;
        writeln!(f, "Date          : {}", self.approved_at)?;
        writeln!(f, "-------------------")?;
        writeln!(f, "Material      : {} ({})", self.material_name, self.material_code)?;
        writeln!(f, "Qty Requested : {} {}", self.quantity_requested, self.unit)?;
        writeln!(f, "Qty Issued    : {} {}", self.quantity_issued, self.unit)?;
        writeln!(f, "Purpose       : {}", self.purpose)?;
        writeln!(f, "Department    : {}", self.requesting_dept)?;
        writeln!(f, "-------------------")?;
        writeln!(f, "Requested By  : {}", self.requested_by)?;
        write!(f, "Approved By   : {}", self.approved_by)
    }
}

/// Recorded stock against the sum of its postings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerAudit {
    pub recorded: u64,
    pub derived: i128,
    pub postings: usize,
}

impl LedgerAudit {
    pub fn is_consistent(&self) -> bool {
        i128::from(self.recorded) == self.derived
    }
}

impl IntakeService {
    fn entries_where<F>(&self, keep: F) -> Result<Vec<GateEntry>, WorkflowError>
    where
        F: Fn(&GateEntry) -> bool,
    {
        let mut entries: Vec<GateEntry> = self
            .store
            .scan::<GateEntry>()?
            .into_iter()
            .filter(|e| keep(e))
            .collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(entries)
    }

    fn officer_queue(
        &self,
        principal: &Principal,
        status: GateEntryStatus,
    ) -> Result<Vec<GateEntry>, WorkflowError> {
        auth::authorize(principal, Action::ViewOfficerQueue)?;
        let everyone = principal.role == Role::Admin;
        self.entries_where(|e| e.status == status && (everyone || e.request_officer == principal.id))
    }

    /// Gate entries for the security desk, optionally narrowed to one status.
    pub fn gate_entries(
        &self,
        principal: &Principal,
        status: Option<GateEntryStatus>,
    ) -> Result<Vec<GateEntry>, WorkflowError> {
        auth::authorize(principal, Action::ListGateEntries)?;
        self.entries_where(|e| status.is_none_or(|s| e.status == s))
    }

    pub fn pending_stage_one(&self, principal: &Principal) -> Result<Vec<GateEntry>, WorkflowError> {
        self.officer_queue(principal, GateEntryStatus::PendingOfficerApproval1)
    }

    pub fn pending_final(&self, principal: &Principal) -> Result<Vec<GateEntry>, WorkflowError> {
        self.officer_queue(principal, GateEntryStatus::PendingOfficerFinalApproval)
    }

    /// Entries cleared at stage 1 and waiting for physical verification.
    pub fn store_pending(&self, principal: &Principal) -> Result<Vec<GateEntry>, WorkflowError> {
        auth::authorize(principal, Action::ViewStoreQueue)?;
        self.entries_where(|e| e.status == GateEntryStatus::ApprovedStage1)
    }

    pub fn inward_detail(
        &self,
        principal: &Principal,
        entry_id: &str,
    ) -> Result<(GateEntry, InwardProcess), WorkflowError> {
        auth::authorize(principal, Action::ViewInwardDetail)?;
        let entry: GateEntry = self.store.require(entry_id)?;
        auth::authorize_assignee(principal, Action::ViewInwardDetail, &entry.request_officer)?;
        let process: InwardProcess = self.store.require(&entry.id)?;
        Ok((entry, process))
    }

    pub fn pending_issues(&self, principal: &Principal) -> Result<Vec<MaterialIssue>, WorkflowError> {
        auth::authorize(principal, Action::ViewOfficerQueue)?;
        let everyone = principal.role == Role::Admin;
        self.issues_where(|i| {
            i.status == IssueStatus::PendingOfficerApproval && (everyone || i.officer_id == principal.id)
        })
    }

    fn issues_where<F>(&self, keep: F) -> Result<Vec<MaterialIssue>, WorkflowError>
    where
        F: Fn(&MaterialIssue) -> bool,
    {
        let mut issues: Vec<MaterialIssue> = self
            .store
            .scan::<MaterialIssue>()?
            .into_iter()
            .filter(|i| keep(i))
            .collect();
        issues.sort_by(|a, b| a.requested_at.cmp(&b.requested_at));
        Ok(issues)
    }

    /// Store managers see what they asked for, officers what they were asked
    /// to approve, admins everything.
    pub fn issue_history(&self, principal: &Principal) -> Result<Vec<MaterialIssue>, WorkflowError> {
        auth::authorize(principal, Action::ViewIssueHistory)?;
        match principal.role {
            Role::Admin => self.issues_where(|_| true),
            Role::Officer => self.issues_where(|i| i.officer_id == principal.id),
            _ => self.issues_where(|i| i.requested_by == principal.id),
        }
    }

    pub fn issue_receipt(
        &self,
        principal: &Principal,
        issue_id: &str,
    ) -> Result<IssueReceipt, WorkflowError> {
        auth::authorize(principal, Action::ViewReceipt)?;
        let issue = self
            .store
            .get::<MaterialIssue>(issue_id)?
            .filter(|i| i.status == IssueStatus::Approved)
            .ok_or_else(|| WorkflowError::not_found("approved issue", issue_id))?;
        auth::authorize_assignee(principal, Action::ViewReceipt, &issue.officer_id)?;

        let material: Material = self.store.require(&issue.material_id)?;
        let approved_by = issue.approved_by.clone().unwrap_or_default();
        Ok(IssueReceipt {
            issue_note_id: issue.issue_note_id.clone().unwrap_or_default(),
            issue_id: issue.id.clone(),
            material_name: material.name,
            material_code: material.code,
            unit: material.unit,
            quantity_requested: issue.quantity_requested,
            quantity_issued: issue.quantity_requested,
            purpose: issue.purpose,
            requesting_dept: issue.requesting_dept,
            requested_by: self.username_of(&issue.requested_by)?,
            approved_by: self.username_of(&approved_by)?,
            approved_at: issue.approved_at.unwrap_or_default(),
        })
    }

    fn username_of(&self, user_id: &str) -> Result<String, WorkflowError> {
        Ok(self
            .store
            .get::<User>(user_id)?
            .map(|u| u.username)
            .unwrap_or_else(|| user_id.to_string()))
    }

    /// Items from finally approved entries only. Officers see the entries they
    /// requested; store managers and admins see everything and who requested it.
    pub fn store_inventory(&self, principal: &Principal) -> Result<Vec<StoreItemView>, WorkflowError> {
        auth::authorize(principal, Action::ViewStoreInventory)?;
        let officer_view = principal.role == Role::Officer;

        let materials: HashMap<String, Material> = self
            .store
            .scan::<Material>()?
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect();
        let mut officer_names: HashMap<String, String> = HashMap::new();
        let mut rows = Vec::new();

        for process in self.store.scan::<InwardProcess>()? {
            let Some(entry) = self.store.get::<GateEntry>(&process.gate_entry_id)? else {
                log::warn!("inward process {} has no gate entry", process.id);
                continue;
            };
            if entry.status != GateEntryStatus::FinalApproved {
                continue;
            }
            if officer_view && entry.request_officer != principal.id {
                continue;
            }

            let officer_name = if officer_view {
                None
            } else {
                if !officer_names.contains_key(&entry.request_officer) {
                    let name = self.username_of(&entry.request_officer)?;
                    officer_names.insert(entry.request_officer.clone(), name);
                }
                officer_names.get(&entry.request_officer).cloned()
            };
            let inward_date = process
                .invoice_date
                .clone()
                .or_else(|| process.final_approved_at.clone());

            for item in &process.items {
                let material = item.material_id.as_ref().and_then(|id| materials.get(id));
                let row = match material {
                    Some(m) => StoreItemView {
                        item_id: item.id.clone(),
                        gate_pass_number: entry.gate_pass_number.clone(),
                        material_id: Some(m.id.clone()),
                        material_code: Some(m.code.clone()),
                        material_name: m.name.clone(),
                        category: non_empty_or(&m.category, &self.inventory.default_category),
                        unit: non_empty_or(&m.unit, &self.inventory.default_unit),
                        quantity: item.quantity_received,
                        store_room: item.store_room.clone(),
                        rack_no: item.rack_no.clone(),
                        shelf_no: item.shelf_no.clone(),
                        inward_date: inward_date.clone(),
                        officer_name: officer_name.clone(),
                    },
                    None => StoreItemView {
                        item_id: item.id.clone(),
                        gate_pass_number: entry.gate_pass_number.clone(),
                        material_id: None,
                        material_code: None,
                        material_name: item
                            .material_description
                            .clone()
                            .unwrap_or_else(|| "Unlisted material".to_string()),
                        category: item
                            .category
                            .clone()
                            .unwrap_or_else(|| self.inventory.default_category.clone()),
                        unit: item
                            .unit
                            .clone()
                            .unwrap_or_else(|| self.inventory.default_unit.clone()),
                        quantity: item.quantity_received,
                        store_room: item.store_room.clone(),
                        rack_no: item.rack_no.clone(),
                        shelf_no: item.shelf_no.clone(),
                        inward_date: inward_date.clone(),
                        officer_name: officer_name.clone(),
                    },
                };
                rows.push(row);
            }
        }

        log::debug!("store inventory for {}: {} row(s)", principal.username, rows.len());
        Ok(rows)
    }

    /// Postings for one material, oldest first.
    pub fn stock_ledger(
        &self,
        principal: &Principal,
        material_id: &str,
    ) -> Result<Vec<InventoryLog>, WorkflowError> {
        auth::authorize(principal, Action::ViewStockLedger)?;
        self.store.require::<Material>(material_id)?;
        self.store.scan_under::<InventoryLog>(material_id)
    }

    /// Materials whose stock has fallen below their minimum level.
    pub fn low_stock(&self, principal: &Principal) -> Result<Vec<Material>, WorkflowError> {
        auth::authorize(principal, Action::ViewMaterials)?;
        let mut materials: Vec<Material> = self
            .store
            .scan::<Material>()?
            .into_iter()
            .filter(|m| m.current_stock < m.min_stock_level)
            .collect();
        materials.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(materials)
    }

    pub fn audit_material(
        &self,
        principal: &Principal,
        material_id: &str,
    ) -> Result<LedgerAudit, WorkflowError> {
        auth::authorize(principal, Action::ViewStockLedger)?;
        let material: Material = self.store.require(material_id)?;
        let postings = self.store.scan_under::<InventoryLog>(material_id)?;
        let audit = LedgerAudit {
            recorded: material.current_stock,
            derived: postings.iter().map(|p| i128::from(p.change_quantity)).sum(),
            postings: postings.len(),
        };
        if !audit.is_consistent() {
            log::warn!(
                "material {} records {} but postings sum to {}",
                material.code,
                audit.recorded,
                audit.derived
            );
        }
        Ok(audit)
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}
