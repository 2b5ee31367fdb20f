#![allow(unused_imports)]

use anyhow::Context;
use sled::open;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use store_intake::auth::Denial;
use store_intake::draft::{
    GateEntryDraft, InwardDraft, InwardItemDraft, InwardItemUpdate, InwardUpdate, IssueDraft,
    MaterialDraft, NewUser,
};
use store_intake::model::{
    GateEntry, GateEntryStatus, InwardProcess, IssueStatus, Material, MaterialIssue, TransactionType,
};
use store_intake::workflow::IssueApproval;
use store_intake::{
    Decision, IntakeService, InventoryConfig, LedgerStore, Principal, Role, TimeStamp,
    ValidationError, WorkflowError,
};

use tempfile::{TempDir, tempdir}; // Use for test db cleanup.

/// A store with one user per role plus a second officer.
struct Desk {
    service: IntakeService,
    admin: Principal,
    security: Principal,
    officer: Principal,
    other_officer: Principal,
    store: Principal,
    // declared last so the db directory outlives the service
    _temp_dir: TempDir,
}

fn open_desk(name: &str) -> anyhow::Result<Desk> {
    // Sled locks the database file, so every test gets its own db under a
    // temp dir that is removed when the test ends.
    let temp_dir = tempdir()?;
    let db = open(temp_dir.path().join(name))?;
    let db = Arc::new(db);
    db.clear()?;

    // minimum bcrypt cost keeps account setup fast
    let service = IntakeService::new(LedgerStore::new(db), InventoryConfig::default())
        .with_password_cost(4);
    let admin = service.bootstrap_admin("admin", "admin-pass")?.principal();
    let add = |username: &str, role: Role| -> anyhow::Result<Principal> {
        let user = service.create_user(&admin, NewUser::new(username, "secret", role))?;
        Ok(user.principal())
    };
    let security = add("gate", Role::Security)?;
    let officer = add("officer", Role::Officer)?;
    let other_officer = add("officer2", Role::Officer)?;
    let store = add("store", Role::StoreManager)?;

    Ok(Desk {
        service,
        admin,
        security,
        officer,
        other_officer,
        store,
        _temp_dir: temp_dir,
    })
}

fn widget(desk: &Desk) -> anyhow::Result<Material> {
    let draft = MaterialDraft::new("MAT-001", "Widget")
        .set_category("SPARES")
        .set_unit("Nos")
        .set_min_stock_level(5);
    Ok(desk.service.create_material(&desk.store, draft)?)
}

/// Gate entry assigned to `officer` and cleared at stage 1.
fn admitted_entry(desk: &Desk, officer: &Principal) -> anyhow::Result<GateEntry> {
    let draft = GateEntryDraft::new()
        .set_vendor_name("Acme")
        .set_vehicle_number("KA-01-1234")
        .set_driver("Ravi", "9800000000")
        .set_request_officer(&officer.id);
    let entry = desk.service.create_gate_entry(&desk.security, draft)?;
    let entry = desk
        .service
        .decide_stage_one(officer, &entry.id, Decision::Approve)
        .context("stage 1 approval failed")?;
    Ok(entry)
}

fn received(material: &Material, quantity: u64) -> InwardDraft {
    InwardDraft::new()
        .set_remarks("seals intact")
        .add_item(InwardItemDraft::linked(&material.id, quantity).set_location("R1", "A", "3"))
}

#[test]
fn delivery_reaches_stock_on_final_approval() -> anyhow::Result<()> {
    let desk = open_desk("test_delivery.db")?;
    let material = widget(&desk)?;

    let entry = desk.service.create_gate_entry(
        &desk.security,
        GateEntryDraft::new()
            .set_vendor_name("Acme")
            .set_request_officer(&desk.officer.id),
    )?;
    assert_eq!(entry.status, GateEntryStatus::PendingOfficerApproval1);
    assert!(entry.gate_pass_number.starts_with("GP-"));

    let entry = desk
        .service
        .decide_stage_one(&desk.officer, &entry.id, Decision::Approve)?;
    assert_eq!(entry.status, GateEntryStatus::ApprovedStage1);

    desk.service
        .process_store_entry(&desk.store, &entry.id, received(&material, 10))
        .context("store processing failed")?;

    // nothing is stock until the officer signs off a second time
    let before: Material = desk.service.store().require(&material.id)?;
    assert_eq!(before.current_stock, 0);

    let approval = desk.service.final_approve(&desk.officer, &entry.id)?;
    assert_eq!(approval.entry.status, GateEntryStatus::FinalApproved);
    assert_eq!(approval.postings.len(), 1);

    let after: Material = desk.service.store().require(&material.id)?;
    assert_eq!(after.current_stock, 10);

    let ledger = desk.service.stock_ledger(&desk.store, &material.id)?;
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].transaction_type, TransactionType::Inward);
    assert_eq!(ledger[0].change_quantity, 10);
    assert_eq!(ledger[0].balance_after, 10);
    assert_eq!(ledger[0].reference_id, entry.gate_pass_number);

    let audit = desk.service.audit_material(&desk.store, &material.id)?;
    assert!(audit.is_consistent());
    assert_eq!(audit.postings, 1);

    Ok(())
}

#[test]
fn issue_beyond_stock_changes_nothing() -> anyhow::Result<()> {
    let desk = open_desk("test_insufficient.db")?;
    let material = widget(&desk)?;
    desk.service
        .adjust_stock(&desk.admin, &material.id, 3, "opening balance")?;

    let issue = desk.service.request_issue(
        &desk.store,
        IssueDraft::new(&material.id, 5)
            .set_purpose("Line maintenance")
            .set_requesting_dept("Electrical")
            .set_officer(&desk.officer.id),
    )?;

    let err = desk
        .service
        .approve_issue(&desk.officer, &issue.id)
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::InsufficientStock {
            available: 3,
            requested: 5,
            ..
        }
    ));

    let material: Material = desk.service.store().require(&material.id)?;
    assert_eq!(material.current_stock, 3);
    let issue = desk.service.store().require::<MaterialIssue>(&issue.id)?;
    assert_eq!(issue.status, IssueStatus::PendingOfficerApproval);
    assert!(issue.issue_note_id.is_none());

    // only the opening adjustment was posted
    let ledger = desk.service.stock_ledger(&desk.store, &material.id)?;
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].transaction_type, TransactionType::Adjustment);

    let err = desk
        .service
        .issue_receipt(&desk.store, &issue.id)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound { .. }));

    Ok(())
}

#[test]
fn approved_issue_posts_and_prints_receipt() -> anyhow::Result<()> {
    let desk = open_desk("test_issue_receipt.db")?;
    let material = widget(&desk)?;
    let entry = admitted_entry(&desk, &desk.officer)?;
    desk.service
        .process_store_entry(&desk.store, &entry.id, received(&material, 10))?;
    desk.service.final_approve(&desk.officer, &entry.id)?;

    let issue = desk.service.request_issue(
        &desk.store,
        IssueDraft::new(&material.id, 4)
            .set_purpose("Pump overhaul")
            .set_requesting_dept("Mechanical")
            .set_officer(&desk.officer.id),
    )?;
    assert_eq!(desk.service.pending_issues(&desk.officer)?.len(), 1);
    assert!(desk.service.pending_issues(&desk.other_officer)?.is_empty());

    let approval = desk.service.approve_issue(&desk.officer, &issue.id)?;
    assert_eq!(approval.issue.status, IssueStatus::Approved);
    assert_eq!(approval.posting.change_quantity, -4);
    assert_eq!(approval.posting.balance_after, 6);
    assert_eq!(approval.posting.transaction_type, TransactionType::Issue);
    assert_eq!(approval.posting.reference_id, format!("ISS-{}", issue.id));

    // approving twice is a state conflict and leaves stock alone
    let err = desk
        .service
        .approve_issue(&desk.officer, &issue.id)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::StateConflict { .. }));
    let material: Material = desk.service.store().require(&material.id)?;
    assert_eq!(material.current_stock, 6);

    let receipt = desk.service.issue_receipt(&desk.store, &issue.id)?;
    assert!(receipt.issue_note_id.starts_with("NOTE-"));
    assert_eq!(receipt.quantity_issued, 4);
    assert_eq!(receipt.requested_by, "store");
    assert_eq!(receipt.approved_by, "officer");
    assert!(receipt.to_string().contains("Material      : Widget (MAT-001)"));

    let err = desk
        .service
        .issue_receipt(&desk.other_officer, &issue.id)
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::AuthorizationDenied {
            reason: Denial::NotAssignee,
            ..
        }
    ));

    let audit = desk.service.audit_material(&desk.officer, &material.id)?;
    assert!(audit.is_consistent());
    assert_eq!(audit.postings, 2);

    Ok(())
}

#[test]
fn rejected_issue_moves_no_stock() -> anyhow::Result<()> {
    let desk = open_desk("test_issue_reject.db")?;
    let material = widget(&desk)?;
    desk.service
        .adjust_stock(&desk.admin, &material.id, 8, "opening balance")?;

    let issue = desk.service.request_issue(
        &desk.store,
        IssueDraft::new(&material.id, 2)
            .set_purpose("Spare")
            .set_requesting_dept("Civil")
            .set_officer(&desk.officer.id),
    )?;

    let err = desk
        .service
        .reject_issue(&desk.officer, &issue.id, "  ")
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Validation(ValidationError::MissingField(_))
    ));

    let issue = desk
        .service
        .reject_issue(&desk.officer, &issue.id, "not budgeted")?;
    assert_eq!(issue.status, IssueStatus::Rejected);
    assert_eq!(issue.remarks.as_deref(), Some("not budgeted"));

    let material: Material = desk.service.store().require(&material.id)?;
    assert_eq!(material.current_stock, 8);
    assert_eq!(desk.service.stock_ledger(&desk.store, &material.id)?.len(), 1);

    Ok(())
}

#[test]
fn store_processing_happens_once() -> anyhow::Result<()> {
    let desk = open_desk("test_process_once.db")?;
    let material = widget(&desk)?;
    let entry = admitted_entry(&desk, &desk.officer)?;

    desk.service
        .process_store_entry(&desk.store, &entry.id, received(&material, 10))?;
    let err = desk
        .service
        .process_store_entry(&desk.store, &entry.id, received(&material, 10))
        .unwrap_err();
    assert!(matches!(err, WorkflowError::StateConflict { .. }));

    let processes = desk.service.store().scan::<InwardProcess>()?;
    assert_eq!(processes.len(), 1);
    assert_eq!(processes[0].items.len(), 1);

    let entry: GateEntry = desk.service.store().require(&entry.id)?;
    assert_eq!(entry.status, GateEntryStatus::PendingOfficerFinalApproval);

    Ok(())
}

#[test]
fn only_the_assigned_officer_decides() -> anyhow::Result<()> {
    let desk = open_desk("test_assignee.db")?;
    let entry = desk.service.create_gate_entry(
        &desk.security,
        GateEntryDraft::new()
            .set_vendor_name("Acme")
            .set_request_officer(&desk.officer.id),
    )?;

    let err = desk
        .service
        .decide_stage_one(&desk.other_officer, &entry.id, Decision::Approve)
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::AuthorizationDenied {
            reason: Denial::NotAssignee,
            ..
        }
    ));

    let err = desk
        .service
        .decide_stage_one(&desk.security, &entry.id, Decision::Approve)
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::AuthorizationDenied {
            reason: Denial::Role(Role::Security),
            ..
        }
    ));

    // neither attempt touched the entry
    let stored: GateEntry = desk.service.store().require(&entry.id)?;
    assert_eq!(stored.status, GateEntryStatus::PendingOfficerApproval1);
    assert_eq!(stored.updated_at, entry.updated_at);

    assert!(desk.service.pending_stage_one(&desk.other_officer)?.is_empty());
    assert_eq!(desk.service.pending_stage_one(&desk.officer)?.len(), 1);

    // admins are never bound to the assignee
    let entry = desk
        .service
        .decide_stage_one(&desk.admin, &entry.id, Decision::Approve)?;
    assert_eq!(entry.status, GateEntryStatus::ApprovedStage1);

    Ok(())
}

#[test]
fn stage_one_rejection_is_final() -> anyhow::Result<()> {
    let desk = open_desk("test_stage_one_reject.db")?;
    let material = widget(&desk)?;
    let entry = desk.service.create_gate_entry(
        &desk.security,
        GateEntryDraft::new()
            .set_vendor_name("Acme")
            .set_request_officer(&desk.officer.id),
    )?;

    let err = desk
        .service
        .decide_stage_one(&desk.officer, &entry.id, Decision::Reject(String::new()))
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    let entry = desk.service.decide_stage_one(
        &desk.officer,
        &entry.id,
        Decision::Reject("no purchase order".to_string()),
    )?;
    assert_eq!(entry.status, GateEntryStatus::RejectedStage1);
    assert_eq!(
        entry.remarks.as_deref(),
        Some("Rejected at stage 1: no purchase order")
    );

    let err = desk
        .service
        .process_store_entry(&desk.store, &entry.id, received(&material, 1))
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::StateConflict {
            actual: "REJECTED_STAGE_1",
            ..
        }
    ));
    assert!(desk.service.store_pending(&desk.store)?.is_empty());

    Ok(())
}

#[test]
fn final_rejection_moves_no_stock() -> anyhow::Result<()> {
    let desk = open_desk("test_final_reject.db")?;
    let material = widget(&desk)?;
    let entry = admitted_entry(&desk, &desk.officer)?;
    desk.service
        .process_store_entry(&desk.store, &entry.id, received(&material, 10))?;

    let entry = desk
        .service
        .final_reject(&desk.officer, &entry.id, "short delivery")?;
    assert_eq!(entry.status, GateEntryStatus::Rejected);

    let (_, process) = desk.service.inward_detail(&desk.officer, &entry.id)?;
    assert_eq!(
        process.remarks.as_deref(),
        Some("seals intact | Rejected: short delivery")
    );

    let material: Material = desk.service.store().require(&material.id)?;
    assert_eq!(material.current_stock, 0);
    assert!(desk.service.stock_ledger(&desk.store, &material.id)?.is_empty());
    assert!(desk.service.store_inventory(&desk.store)?.is_empty());

    // terminal, so a late approval is refused
    let err = desk
        .service
        .final_approve(&desk.officer, &entry.id)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::StateConflict { .. }));

    Ok(())
}

#[test]
fn store_edits_apply_until_final_approval() -> anyhow::Result<()> {
    let desk = open_desk("test_store_update.db")?;
    let material = widget(&desk)?;
    let entry = admitted_entry(&desk, &desk.officer)?;

    // nothing to edit before the store has processed the entry
    let err = desk
        .service
        .update_store_entry(
            &desk.store,
            &entry.id,
            InwardUpdate::new().set_remarks("early"),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::StateConflict {
            actual: "APPROVED_STAGE_1",
            ..
        }
    ));

    let process = desk
        .service
        .process_store_entry(&desk.store, &entry.id, received(&material, 10))?;
    let item_id = process.items[0].id.clone();

    let invoice_date = TimeStamp::new_with(2026, 10, 1, 0, 0, 0).context("invalid date")?;
    let process = desk.service.update_store_entry(
        &desk.store,
        &entry.id,
        InwardUpdate::new()
            .set_invoice_no("INV-77")
            .set_invoice_date(invoice_date.clone())
            .update_item(InwardItemUpdate::new(&item_id).set_quantity(8).set_shelf_no("4"))
            .update_item(InwardItemUpdate::new("item_missing").set_quantity(99)),
    )?;
    assert_eq!(process.invoice_no.as_deref(), Some("INV-77"));
    assert_eq!(process.items.len(), 1);
    assert_eq!(process.items[0].quantity_received, 8);
    assert_eq!(process.items[0].shelf_no.as_deref(), Some("4"));
    assert_eq!(process.items[0].rack_no.as_deref(), Some("A"));

    desk.service.final_approve(&desk.officer, &entry.id)?;
    let material: Material = desk.service.store().require(&material.id)?;
    assert_eq!(material.current_stock, 8);

    let rows = desk.service.store_inventory(&desk.store)?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].inward_date, Some(invoice_date));

    let err = desk
        .service
        .update_store_entry(
            &desk.store,
            &entry.id,
            InwardUpdate::new().set_remarks("too late"),
        )
        .unwrap_err();
    assert!(matches!(err, WorkflowError::StateConflict { .. }));

    Ok(())
}

#[test]
fn store_inventory_is_filtered_by_role() -> anyhow::Result<()> {
    let desk = open_desk("test_store_view.db")?;
    let material = widget(&desk)?;

    let mine = admitted_entry(&desk, &desk.officer)?;
    desk.service
        .process_store_entry(&desk.store, &mine.id, received(&material, 10))?;
    desk.service.final_approve(&desk.officer, &mine.id)?;

    let theirs = admitted_entry(&desk, &desk.other_officer)?;
    desk.service.process_store_entry(
        &desk.store,
        &theirs.id,
        InwardDraft::new().add_item(InwardItemDraft::described("Copper wire", 3)),
    )?;
    desk.service.final_approve(&desk.other_officer, &theirs.id)?;

    // processed but not yet approved, so not in the store
    let pending = admitted_entry(&desk, &desk.officer)?;
    desk.service
        .process_store_entry(&desk.store, &pending.id, received(&material, 7))?;

    let officer_rows = desk.service.store_inventory(&desk.officer)?;
    assert_eq!(officer_rows.len(), 1);
    assert_eq!(officer_rows[0].material_code.as_deref(), Some("MAT-001"));
    assert_eq!(officer_rows[0].quantity, 10);
    assert_eq!(officer_rows[0].location(), "R1 / A / 3");
    assert!(officer_rows[0].officer_name.is_none());

    let store_rows = desk.service.store_inventory(&desk.store)?;
    assert_eq!(store_rows.len(), 2);
    let wire = store_rows
        .iter()
        .find(|r| r.material_id.is_none())
        .context("unlinked item missing from store view")?;
    assert_eq!(wire.material_name, "Copper wire");
    assert_eq!(wire.unit, "Nos");
    assert_eq!(wire.category, "GENERAL");
    assert_eq!(wire.officer_name.as_deref(), Some("officer2"));

    // unlinked items never touch the stock ledger
    let material: Material = desk.service.store().require(&material.id)?;
    assert_eq!(material.current_stock, 10);

    let err = desk.service.store_inventory(&desk.security).unwrap_err();
    assert!(matches!(err, WorkflowError::AuthorizationDenied { .. }));

    Ok(())
}

#[test]
fn gate_entries_must_name_an_active_officer() -> anyhow::Result<()> {
    let desk = open_desk("test_officer_check.db")?;

    let err = desk
        .service
        .create_gate_entry(
            &desk.security,
            GateEntryDraft::new()
                .set_vendor_name("Acme")
                .set_request_officer(&desk.store.id),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Validation(ValidationError::NotAnOfficer(_))
    ));

    desk.service.deactivate_user(&desk.admin, &desk.other_officer.id)?;
    let officers = desk.service.list_officers(&desk.security)?;
    assert_eq!(officers.len(), 1);
    assert_eq!(officers[0].username, "officer");

    let err = desk
        .service
        .create_gate_entry(
            &desk.security,
            GateEntryDraft::new()
                .set_vendor_name("Acme")
                .set_request_officer(&desk.other_officer.id),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Validation(ValidationError::NotAnOfficer(_))
    ));
    assert!(desk.service.gate_entries(&desk.security, None)?.is_empty());

    Ok(())
}

#[test]
fn accounts_and_catalog_rules() -> anyhow::Result<()> {
    let desk = open_desk("test_accounts.db")?;

    let err = desk
        .service
        .bootstrap_admin("root", "another")
        .unwrap_err();
    assert!(matches!(err, WorkflowError::AlreadyBootstrapped));

    let principal = desk.service.authenticate("officer", "secret")?;
    assert_eq!(principal.role, Role::Officer);
    assert!(matches!(
        desk.service.authenticate("officer", "wrong").unwrap_err(),
        WorkflowError::AuthenticationFailed
    ));

    desk.service.deactivate_user(&desk.admin, &desk.officer.id)?;
    assert!(matches!(
        desk.service.authenticate("officer", "secret").unwrap_err(),
        WorkflowError::AuthenticationFailed
    ));

    let err = desk
        .service
        .create_user(&desk.store, NewUser::new("intruder", "pw", Role::Admin))
        .unwrap_err();
    assert!(matches!(err, WorkflowError::AuthorizationDenied { .. }));

    let err = desk
        .service
        .create_user(&desk.admin, NewUser::new("gate", "pw", Role::Security))
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Validation(ValidationError::DuplicateUsername(_))
    ));

    let material = widget(&desk)?;
    let err = widget(&desk).unwrap_err();
    assert!(err.to_string().contains("MAT-001"));

    assert_eq!(
        desk.service.material_by_code(&desk.store, "MAT-001")?.id,
        material.id
    );
    // below its minimum of 5 while empty
    assert_eq!(desk.service.low_stock(&desk.store)?.len(), 1);

    let err = desk
        .service
        .adjust_stock(&desk.admin, &material.id, -1, "count correction")
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InsufficientStock { .. }));
    let err = desk
        .service
        .adjust_stock(&desk.store, &material.id, 5, "count correction")
        .unwrap_err();
    assert!(matches!(err, WorkflowError::AuthorizationDenied { .. }));

    let posting = desk
        .service
        .adjust_stock(&desk.admin, &material.id, 5, "count correction")?;
    assert!(posting.reference_id.starts_with("ADJ-"));
    assert!(desk.service.low_stock(&desk.store)?.is_empty());

    Ok(())
}

#[test]
fn final_approval_posts_each_linked_item() -> anyhow::Result<()> {
    let desk = open_desk("test_multi_item.db")?;
    let material = widget(&desk)?;
    desk.service
        .adjust_stock(&desk.admin, &material.id, 2, "opening balance")?;

    let entry = admitted_entry(&desk, &desk.officer)?;
    desk.service.process_store_entry(
        &desk.store,
        &entry.id,
        InwardDraft::new()
            .add_item(InwardItemDraft::linked(&material.id, 3))
            .add_item(InwardItemDraft::described("Pallet wrap", 100))
            .add_item(InwardItemDraft::linked(&material.id, 4)),
    )?;

    let approval = desk.service.final_approve(&desk.officer, &entry.id)?;
    let balances: Vec<u64> = approval.postings.iter().map(|p| p.balance_after).collect();
    assert_eq!(balances, vec![5, 9]);

    // the opening adjustment, then one INWARD posting per linked item
    let ledger: Vec<(i64, u64)> = desk
        .service
        .stock_ledger(&desk.store, &material.id)?
        .iter()
        .map(|p| (p.change_quantity, p.balance_after))
        .collect();
    assert_eq!(ledger, vec![(2, 2), (3, 5), (4, 9)]);

    let material: Material = desk.service.store().require(&material.id)?;
    assert_eq!(material.current_stock, 9);
    let audit = desk.service.audit_material(&desk.store, &material.id)?;
    assert!(audit.is_consistent());
    assert_eq!(audit.postings, 3);

    Ok(())
}

#[test]
fn listings_are_oldest_first() -> anyhow::Result<()> {
    let desk = open_desk("test_listing_order.db")?;
    let material = widget(&desk)?;
    desk.service
        .adjust_stock(&desk.admin, &material.id, 10, "opening balance")?;

    for vendor in ["Acme", "Bolt", "Crane"] {
        desk.service.create_gate_entry(
            &desk.security,
            GateEntryDraft::new()
                .set_vendor_name(vendor)
                .set_request_officer(&desk.officer.id),
        )?;
        // keep creation times distinct
        thread::sleep(Duration::from_millis(2));
    }
    let vendors: Vec<String> = desk
        .service
        .gate_entries(&desk.security, None)?
        .into_iter()
        .map(|e| e.vendor_name)
        .collect();
    assert_eq!(vendors, vec!["Acme", "Bolt", "Crane"]);

    for dept in ["Civil", "Electrical", "Mechanical"] {
        desk.service.request_issue(
            &desk.store,
            IssueDraft::new(&material.id, 1)
                .set_purpose("Maintenance")
                .set_requesting_dept(dept)
                .set_officer(&desk.officer.id),
        )?;
        thread::sleep(Duration::from_millis(2));
    }
    for viewer in [&desk.store, &desk.officer, &desk.admin] {
        let depts: Vec<String> = desk
            .service
            .issue_history(viewer)?
            .into_iter()
            .map(|i| i.requesting_dept)
            .collect();
        assert_eq!(depts, vec!["Civil", "Electrical", "Mechanical"]);
    }

    Ok(())
}

#[test]
fn concurrent_issue_approvals_post_once() -> anyhow::Result<()> {
    let desk = open_desk("test_concurrent_approval.db")?;
    let material = widget(&desk)?;
    desk.service
        .adjust_stock(&desk.admin, &material.id, 10, "opening balance")?;

    // enough stock for both, so only the status check can stop the second
    let issue = desk.service.request_issue(
        &desk.store,
        IssueDraft::new(&material.id, 4)
            .set_purpose("Pump overhaul")
            .set_requesting_dept("Mechanical")
            .set_officer(&desk.officer.id),
    )?;

    let results: Vec<Result<IssueApproval, WorkflowError>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|_| scope.spawn(|| desk.service.approve_issue(&desk.officer, &issue.id)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("approval thread panicked"))
            .collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(WorkflowError::StateConflict {
            actual: "APPROVED",
            ..
        })
    )));

    let postings = desk.service.stock_ledger(&desk.store, &material.id)?;
    let issues = postings
        .iter()
        .filter(|p| p.transaction_type == TransactionType::Issue)
        .count();
    assert_eq!(issues, 1);

    let material: Material = desk.service.store().require(&material.id)?;
    assert_eq!(material.current_stock, 6);

    Ok(())
}
