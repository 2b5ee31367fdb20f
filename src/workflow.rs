//! Service layer for the gate entry and material issue workflows.
//!
//! Each transition authorizes the caller's role up front, then inside one
//! transaction re-reads the record, checks the assignee and the status
//! precondition, and writes the new status together with any ledger postings.
//! A failed check aborts the transaction, so nothing is written.

use crate::auth::{self, Action};
use crate::config::InventoryConfig;
use crate::draft::{GateEntryDraft, InwardDraft, InwardItemDraft, InwardUpdate, IssueDraft};
use crate::error::{ValidationError, WorkflowError};
use crate::model::{
    GateEntry, GateEntryStatus, InventoryLog, InwardItem, InwardProcess, IssueStatus, Material,
    MaterialIssue, TransactionType, User,
};
use crate::state::{EntryEvent, IssueEvent};
use crate::store::{self, Index, LedgerStore, TxResult};
use crate::types::{Decision, Principal, TimeStamp};
use crate::utils;
use sled::transaction::{ConflictableTransactionError, TransactionalTree};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

pub struct IntakeService {
    pub(crate) store: LedgerStore,
    pub(crate) inventory: InventoryConfig,
    pub(crate) password_cost: u32,
}

/// Outcome of a final approval: the entry and the postings it produced.
#[derive(Debug, Clone)]
pub struct FinalApproval {
    pub entry: GateEntry,
    pub postings: Vec<InventoryLog>,
}

/// Outcome of an issue approval.
#[derive(Debug, Clone)]
pub struct IssueApproval {
    pub issue: MaterialIssue,
    pub posting: InventoryLog,
}

fn advance_entry(entry: &GateEntry, event: EntryEvent) -> TxResult<GateEntryStatus> {
    match entry.status.apply(event) {
        Some(next) => Ok(next),
        None => {
            log::warn!(
                "gate entry {} is {}, cannot apply {event:?}",
                entry.gate_pass_number,
                entry.status
            );
            store::abort(WorkflowError::StateConflict {
                kind: "gate entry",
                id: entry.id.clone(),
                expected: event.required_status().as_str(),
                actual: entry.status.as_str(),
            })
        }
    }
}

fn advance_issue(issue: &MaterialIssue, event: IssueEvent) -> TxResult<IssueStatus> {
    match issue.status.apply(event) {
        Some(next) => Ok(next),
        None => {
            log::warn!("issue {} is {}, cannot apply {event:?}", issue.id, issue.status);
            store::abort(WorkflowError::StateConflict {
                kind: "material issue",
                id: issue.id.clone(),
                expected: IssueStatus::PendingOfficerApproval.as_str(),
                actual: issue.status.as_str(),
            })
        }
    }
}

fn check_assignee(principal: &Principal, action: Action, assignee: &str) -> TxResult<()> {
    auth::authorize_assignee(principal, action, assignee).map_err(ConflictableTransactionError::Abort)
}

/// Loads a user that must be an active officer to be named as an approver.
fn require_officer(tx: &TransactionalTree, officer_id: &str) -> TxResult<User> {
    let officer: User = store::require(tx, officer_id)?;
    if !officer.is_active_officer() {
        return store::abort(ValidationError::NotAnOfficer(officer.username));
    }
    Ok(officer)
}

// fill empty master fields from what the store manager recorded on receipt
fn backfill_material(material: &mut Material, item: &InwardItemDraft) -> bool {
    let mut changed = false;
    if material.category.is_empty() {
        if let Some(category) = &item.category {
            material.category = category.clone();
            changed = true;
        }
    }
    if material.unit.is_empty() {
        if let Some(unit) = &item.unit {
            material.unit = unit.clone();
            changed = true;
        }
    }
    if material.description.is_none() && item.material_description.is_some() {
        material.description = item.material_description.clone();
        changed = true;
    }
    changed
}

fn signed(quantity: u64) -> TxResult<i64> {
    match i64::try_from(quantity) {
        Ok(q) => Ok(q),
        Err(_) => store::abort(ValidationError::QuantityOverflow),
    }
}

fn append_remark(existing: Option<String>, remark: String) -> String {
    match existing {
        Some(old) if !old.is_empty() => format!("{old} | {remark}"),
        _ => remark,
    }
}

impl IntakeService {
    pub fn new(store: LedgerStore, inventory: InventoryConfig) -> Self {
        Self {
            store,
            inventory,
            password_cost: bcrypt::DEFAULT_COST,
        }
    }

    /// bcrypt work factor used when storing new passwords.
    pub fn with_password_cost(mut self, cost: u32) -> Self {
        self.password_cost = cost;
        self
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    /// Security records an arrival at the gate.
    pub fn create_gate_entry(
        &self,
        principal: &Principal,
        draft: GateEntryDraft,
    ) -> Result<GateEntry, WorkflowError> {
        auth::authorize(principal, Action::CreateGateEntry)?;
        draft.validate()?;

        let entry_id = utils::new_uuid_to_bech32("entry_")?;
        let entry = self.store.transaction(|tx| {
            let officer_id = draft.request_officer_id.clone().unwrap_or_default();
            require_officer(tx, &officer_id)?;

            let gate_pass_number = store::unique_token(tx, Index::GatePass, utils::new_gate_pass_number)?;
            let now = TimeStamp::new();
            let entry = GateEntry {
                id: entry_id.clone(),
                gate_pass_number,
                vendor_name: draft.vendor_name.clone().unwrap_or_default(),
                vendor_location: draft.vendor_location.clone(),
                vehicle_number: draft.vehicle_number.clone(),
                driver_name: draft.driver_name.clone(),
                driver_phone: draft.driver_phone.clone(),
                material_type_desc: draft.material_type_desc.clone(),
                approx_quantity: draft.approx_quantity,
                created_by: principal.id.clone(),
                request_officer: officer_id,
                status: GateEntryStatus::PendingOfficerApproval1,
                remarks: None,
                created_at: now.clone(),
                updated_at: now,
            };

            store::put(tx, &entry)?;
            store::index_put(tx, Index::GatePass, &entry.gate_pass_number, &entry.id)?;
            Ok(entry)
        })?;

        log::info!(
            "gate pass {} issued by {} for vendor {}",
            entry.gate_pass_number,
            principal.username,
            entry.vendor_name
        );
        Ok(entry)
    }

    /// The assigned officer lets the goods in, or turns them away.
    pub fn decide_stage_one(
        &self,
        principal: &Principal,
        entry_id: &str,
        decision: Decision,
    ) -> Result<GateEntry, WorkflowError> {
        auth::authorize(principal, Action::DecideStageOne)?;
        if let Decision::Reject(reason) = &decision {
            if reason.trim().is_empty() {
                return Err(ValidationError::MissingField("rejection reason").into());
            }
        }

        let event = match decision {
            Decision::Approve => EntryEvent::StageOneApproved,
            Decision::Reject(_) => EntryEvent::StageOneRejected,
        };

        let entry = self.store.transaction(|tx| {
            let mut entry: GateEntry = store::require(tx, entry_id)?;
            check_assignee(principal, Action::DecideStageOne, &entry.request_officer)?;
            entry.status = advance_entry(&entry, event)?;
            if let Decision::Reject(reason) = &decision {
                entry.remarks = Some(append_remark(
                    entry.remarks.clone(),
                    format!("Rejected at stage 1: {}", reason.trim()),
                ));
            }
            entry.updated_at = TimeStamp::new();

            store::put(tx, &entry)?;
            Ok(entry)
        })?;

        log::info!(
            "gate pass {} moved to {} by {}",
            entry.gate_pass_number,
            entry.status,
            principal.username
        );
        Ok(entry)
    }

    /// The store manager records what physically arrived and where it is kept.
    pub fn process_store_entry(
        &self,
        principal: &Principal,
        entry_id: &str,
        draft: InwardDraft,
    ) -> Result<InwardProcess, WorkflowError> {
        auth::authorize(principal, Action::ProcessStoreEntry)?;
        draft.validate()?;

        let process_id = utils::new_uuid_to_bech32("inward_")?;
        let item_ids = draft
            .items
            .iter()
            .map(|_| utils::new_uuid_to_bech32("item_"))
            .collect::<Result<Vec<_>, _>>()?;

        let process = self.store.transaction(|tx| {
            let mut entry: GateEntry = store::require(tx, entry_id)?;
            let next = advance_entry(&entry, EntryEvent::StoreProcessed)?;
            if store::fetch::<InwardProcess>(tx, &entry.id)?.is_some() {
                return store::abort(WorkflowError::StateConflict {
                    kind: "gate entry",
                    id: entry.id.clone(),
                    expected: "unprocessed",
                    actual: "already processed",
                });
            }

            let mut items = Vec::with_capacity(draft.items.len());
            for (item, item_id) in draft.items.iter().zip(&item_ids) {
                if let Some(material_id) = &item.material_id {
                    let mut material: Material = store::require(tx, material_id)?;
                    if backfill_material(&mut material, item) {
                        store::put(tx, &material)?;
                    }
                }
                items.push(InwardItem {
                    id: item_id.clone(),
                    material_id: item.material_id.clone(),
                    material_description: item.material_description.clone(),
                    category: item.category.clone(),
                    unit: item.unit.clone(),
                    quantity_received: item.quantity_received,
                    store_room: item.store_room.clone(),
                    rack_no: item.rack_no.clone(),
                    shelf_no: item.shelf_no.clone(),
                });
            }

            let now = TimeStamp::new();
            let process = InwardProcess {
                id: process_id.clone(),
                gate_entry_id: entry.id.clone(),
                invoice_no: draft.invoice_no.clone(),
                invoice_date: draft.invoice_date.clone(),
                remarks: draft.remarks.clone(),
                physical_check_done: true,
                processed_by: principal.id.clone(),
                processed_at: now.clone(),
                final_approved_by: None,
                final_approved_at: None,
                items,
            };
            entry.status = next;
            entry.updated_at = now;

            store::put(tx, &process)?;
            store::put(tx, &entry)?;
            Ok(process)
        })?;

        log::info!(
            "inward process {} recorded {} item(s) for entry {}",
            process.id,
            process.items.len(),
            entry_id
        );
        Ok(process)
    }

    /// Partial edit of a processed entry while it awaits the final decision.
    pub fn update_store_entry(
        &self,
        principal: &Principal,
        entry_id: &str,
        update: InwardUpdate,
    ) -> Result<InwardProcess, WorkflowError> {
        auth::authorize(principal, Action::UpdateStoreEntry)?;
        update.validate()?;

        let process = self.store.transaction(|tx| {
            let entry: GateEntry = store::require(tx, entry_id)?;
            if entry.status != GateEntryStatus::PendingOfficerFinalApproval {
                return store::abort(WorkflowError::StateConflict {
                    kind: "gate entry",
                    id: entry.id.clone(),
                    expected: GateEntryStatus::PendingOfficerFinalApproval.as_str(),
                    actual: entry.status.as_str(),
                });
            }
            let mut process: InwardProcess = store::require(tx, &entry.id)?;

            if update.invoice_no.is_some() {
                process.invoice_no = update.invoice_no.clone();
            }
            if update.invoice_date.is_some() {
                process.invoice_date = update.invoice_date.clone();
            }
            if update.remarks.is_some() {
                process.remarks = update.remarks.clone();
            }

            for change in &update.items {
                let Some(item) = process.items.iter_mut().find(|i| i.id == change.id) else {
                    log::warn!("inward process {} has no item {}, skipping", process.id, change.id);
                    continue;
                };
                if let Some(material_id) = &change.material_id {
                    store::require::<Material>(tx, material_id)?;
                    item.material_id = Some(material_id.clone());
                }
                if let Some(quantity) = change.quantity_received {
                    item.quantity_received = quantity;
                }
                for (field, value) in [
                    (&mut item.material_description, &change.material_description),
                    (&mut item.category, &change.category),
                    (&mut item.unit, &change.unit),
                    (&mut item.store_room, &change.store_room),
                    (&mut item.rack_no, &change.rack_no),
                    (&mut item.shelf_no, &change.shelf_no),
                ] {
                    if value.is_some() {
                        *field = value.clone();
                    }
                }
            }

            store::put(tx, &process)?;
            Ok(process)
        })?;

        log::info!("inward process {} edited by {}", process.id, principal.username);
        Ok(process)
    }

    /// Second officer sign-off. The only place received goods become stock.
    pub fn final_approve(
        &self,
        principal: &Principal,
        entry_id: &str,
    ) -> Result<FinalApproval, WorkflowError> {
        auth::authorize(principal, Action::DecideFinal)?;

        let approval = self.store.transaction(|tx| {
            let mut entry: GateEntry = store::require(tx, entry_id)?;
            check_assignee(principal, Action::DecideFinal, &entry.request_officer)?;
            let next = advance_entry(&entry, EntryEvent::FinalApproved)?;
            let mut process: InwardProcess = store::require(tx, &entry.id)?;

            let now = TimeStamp::new();
            let mut materials: BTreeMap<String, Material> = BTreeMap::new();
            let mut postings = Vec::new();

            for item in &process.items {
                // unlinked items stay on the physical record only
                let Some(material_id) = &item.material_id else {
                    continue;
                };
                let material = match materials.entry(material_id.clone()) {
                    Entry::Occupied(slot) => slot.into_mut(),
                    Entry::Vacant(slot) => slot.insert(store::require(tx, material_id)?),
                };
                let Some(balance) = material.current_stock.checked_add(item.quantity_received)
                else {
                    return store::abort(ValidationError::QuantityOverflow);
                };
                material.current_stock = balance;

                postings.push(InventoryLog {
                    id: utils::new_sequence_id(),
                    material_id: material.id.clone(),
                    change_quantity: signed(item.quantity_received)?,
                    balance_after: balance,
                    transaction_type: TransactionType::Inward,
                    reference_id: entry.gate_pass_number.clone(),
                    remarks: None,
                    created_by: principal.id.clone(),
                    created_at: now.clone(),
                });
            }

            for material in materials.values() {
                store::put(tx, material)?;
            }
            for posting in &postings {
                store::put(tx, posting)?;
            }

            process.final_approved_by = Some(principal.id.clone());
            process.final_approved_at = Some(now.clone());
            entry.status = next;
            entry.updated_at = now;

            store::put(tx, &process)?;
            store::put(tx, &entry)?;
            Ok(FinalApproval { entry, postings })
        })?;

        log::info!(
            "gate pass {} final approved by {}, {} stock posting(s)",
            approval.entry.gate_pass_number,
            principal.username,
            approval.postings.len()
        );
        Ok(approval)
    }

    /// Second officer sign-off refused. No stock moves.
    pub fn final_reject(
        &self,
        principal: &Principal,
        entry_id: &str,
        reason: &str,
    ) -> Result<GateEntry, WorkflowError> {
        auth::authorize(principal, Action::DecideFinal)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ValidationError::MissingField("rejection reason").into());
        }

        let entry = self.store.transaction(|tx| {
            let mut entry: GateEntry = store::require(tx, entry_id)?;
            check_assignee(principal, Action::DecideFinal, &entry.request_officer)?;
            let next = advance_entry(&entry, EntryEvent::FinalRejected)?;
            let mut process: InwardProcess = store::require(tx, &entry.id)?;

            let now = TimeStamp::new();
            process.remarks = Some(append_remark(
                process.remarks.clone(),
                format!("Rejected: {reason}"),
            ));
            process.final_approved_by = Some(principal.id.clone());
            process.final_approved_at = Some(now.clone());
            entry.status = next;
            entry.updated_at = now;

            store::put(tx, &process)?;
            store::put(tx, &entry)?;
            Ok(entry)
        })?;

        log::info!(
            "gate pass {} rejected at final approval by {}",
            entry.gate_pass_number,
            principal.username
        );
        Ok(entry)
    }

    /// Store manager asks a named officer to release stock to a department.
    pub fn request_issue(
        &self,
        principal: &Principal,
        draft: IssueDraft,
    ) -> Result<MaterialIssue, WorkflowError> {
        auth::authorize(principal, Action::RequestIssue)?;
        draft.validate()?;

        let issue_id = utils::new_uuid_to_bech32("issue_")?;
        let issue = self.store.transaction(|tx| {
            let material_id = draft.material_id.clone().unwrap_or_default();
            let officer_id = draft.officer_id.clone().unwrap_or_default();
            store::require::<Material>(tx, &material_id)?;
            require_officer(tx, &officer_id)?;

            let issue = MaterialIssue {
                id: issue_id.clone(),
                material_id,
                quantity_requested: draft.quantity_requested,
                purpose: draft.purpose.clone().unwrap_or_default(),
                requesting_dept: draft.requesting_dept.clone().unwrap_or_default(),
                officer_id,
                requested_by: principal.id.clone(),
                requested_at: TimeStamp::new(),
                status: IssueStatus::PendingOfficerApproval,
                approved_by: None,
                approved_at: None,
                issue_note_id: None,
                remarks: None,
            };
            store::put(tx, &issue)?;
            Ok(issue)
        })?;

        log::info!(
            "issue {} requested by {} for {} unit(s)",
            issue.id,
            principal.username,
            issue.quantity_requested
        );
        Ok(issue)
    }

    /// Officer releases the stock. Either every effect applies or none does.
    pub fn approve_issue(
        &self,
        principal: &Principal,
        issue_id: &str,
    ) -> Result<IssueApproval, WorkflowError> {
        auth::authorize(principal, Action::DecideIssue)?;

        let approval = self.store.transaction(|tx| {
            let mut issue: MaterialIssue = store::require(tx, issue_id)?;
            check_assignee(principal, Action::DecideIssue, &issue.officer_id)?;
            let next = advance_issue(&issue, IssueEvent::Approved)?;
            let mut material: Material = store::require(tx, &issue.material_id)?;

            if material.current_stock < issue.quantity_requested {
                return store::abort(WorkflowError::InsufficientStock {
                    material: material.code.clone(),
                    available: material.current_stock,
                    requested: issue.quantity_requested,
                });
            }
            material.current_stock -= issue.quantity_requested;

            let now = TimeStamp::new();
            let note_id = store::unique_token(tx, Index::IssueNote, utils::new_issue_note_id)?;
            let posting = InventoryLog {
                id: utils::new_sequence_id(),
                material_id: material.id.clone(),
                change_quantity: -signed(issue.quantity_requested)?,
                balance_after: material.current_stock,
                transaction_type: TransactionType::Issue,
                reference_id: issue.ledger_reference(),
                remarks: None,
                created_by: principal.id.clone(),
                created_at: now.clone(),
            };

            issue.status = next;
            issue.approved_by = Some(principal.id.clone());
            issue.approved_at = Some(now);
            issue.issue_note_id = Some(note_id.clone());

            store::put(tx, &material)?;
            store::put(tx, &posting)?;
            store::put(tx, &issue)?;
            store::index_put(tx, Index::IssueNote, &note_id, &issue.id)?;
            Ok(IssueApproval { issue, posting })
        })?;

        log::info!(
            "issue {} approved by {}, balance now {}",
            approval.issue.id,
            principal.username,
            approval.posting.balance_after
        );
        Ok(approval)
    }

    /// Officer declines to release the stock.
    pub fn reject_issue(
        &self,
        principal: &Principal,
        issue_id: &str,
        reason: &str,
    ) -> Result<MaterialIssue, WorkflowError> {
        auth::authorize(principal, Action::DecideIssue)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ValidationError::MissingField("rejection reason").into());
        }

        let issue = self.store.transaction(|tx| {
            let mut issue: MaterialIssue = store::require(tx, issue_id)?;
            check_assignee(principal, Action::DecideIssue, &issue.officer_id)?;
            issue.status = advance_issue(&issue, IssueEvent::Rejected)?;
            issue.approved_by = Some(principal.id.clone());
            issue.approved_at = Some(TimeStamp::new());
            issue.remarks = Some(reason.to_string());

            store::put(tx, &issue)?;
            Ok(issue)
        })?;

        log::info!("issue {} rejected by {}", issue.id, principal.username);
        Ok(issue)
    }
}
