//! Smoke screen unit tests for the store intake components
//!
//! These tests span the codebase and check behavior in isolation from the
//! workflow scenarios. They are intended as a smoke screen and mostly cover
//! the happy path.
//!
#![allow(unused_imports)]

use chrono::{Datelike, Timelike, Utc};
use store_intake::{
    auth::{self, Action, Denial},
    draft::{GateEntryDraft, InwardDraft, InwardItemDraft, IssueDraft, MaterialDraft, NewUser},
    model::{GateEntryStatus, IssueStatus},
    state::{EntryEvent, IssueEvent},
    types::{Principal, Role, TimeStamp},
    utils::{new_gate_pass_number, new_issue_note_id, new_sequence_id, new_uuid_to_bech32},
    ValidationError, WorkflowError,
};

// UTILS MODULE TESTS
#[cfg(test)]
mod utils_tests {
    use super::*;

    /// Entity ids are bech32 strings carrying the requested prefix
    #[test]
    fn generates_valid_bech32_with_hrp() {
        let result = new_uuid_to_bech32("entry_");
        assert!(result.is_ok());

        let encoded = result.unwrap();
        assert!(encoded.starts_with("entry_1"));
        assert!(encoded.len() > 10);
    }

    #[test]
    fn handles_empty_hrp() {
        let result = new_uuid_to_bech32("");
        assert!(matches!(result, Err(WorkflowError::Identifier(_))));
    }

    /// Sequence ids are used as ledger keys, so later ids must sort after earlier ones
    #[test]
    fn sequence_ids_sort_in_creation_order() {
        let ids: Vec<String> = (0..16).map(|_| new_sequence_id()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn document_numbers_are_prefixed() {
        let gate_pass = new_gate_pass_number();
        let note = new_issue_note_id();
        assert!(gate_pass.starts_with("GP-"));
        assert_eq!(gate_pass.len(), "GP-".len() + 8);
        assert!(note.starts_with("NOTE-"));
        assert_ne!(new_gate_pass_number(), new_gate_pass_number());
    }
}

// TYPES MODULE TESTS
#[cfg(test)]
mod types_tests {
    use super::*;

    #[test]
    fn timestamp_new_with_sets_fields() {
        let ts = TimeStamp::new_with(2026, 3, 14, 15, 9, 26).unwrap();
        let dt = ts.to_datetime_utc();
        assert_eq!(dt.year(), 2026);
        assert_eq!(dt.month(), 3);
        assert_eq!(dt.day(), 14);
        assert_eq!(dt.hour(), 15);
        assert_eq!(ts.to_string(), "2026-03-14 15:09:26 UTC");
    }

    #[test]
    fn timestamp_rejects_impossible_dates() {
        assert!(TimeStamp::new_with(2026, 2, 30, 0, 0, 0).is_none());
    }

    #[test]
    fn roles_parse_from_their_names() {
        for role in [Role::Security, Role::Officer, Role::StoreManager, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert_eq!("store_manager".parse::<Role>().unwrap(), Role::StoreManager);
        assert_eq!(
            "CLERK".parse::<Role>().unwrap_err(),
            ValidationError::UnknownRole("CLERK".to_string())
        );
    }
}

// DRAFT VALIDATION TESTS
#[cfg(test)]
mod draft_tests {
    use super::*;

    #[test]
    fn gate_entry_needs_vendor_and_officer() {
        let draft = GateEntryDraft::new().set_request_officer("user_1abc");
        assert_eq!(
            draft.validate(),
            Err(ValidationError::MissingField("vendor name"))
        );

        let draft = GateEntryDraft::new().set_vendor_name("  Acme ");
        assert_eq!(
            draft.validate(),
            Err(ValidationError::MissingField("request officer"))
        );

        let draft = GateEntryDraft::new()
            .set_vendor_name("Acme")
            .set_request_officer("user_1abc");
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn inward_draft_needs_identified_positive_items() {
        assert_eq!(InwardDraft::new().validate(), Err(ValidationError::NoItems));

        let zero = InwardDraft::new().add_item(InwardItemDraft::linked("mat_1abc", 0));
        assert_eq!(zero.validate(), Err(ValidationError::NonPositiveQuantity));

        let anonymous = InwardDraft::new().add_item(InwardItemDraft::described("   ", 2));
        assert_eq!(anonymous.validate(), Err(ValidationError::UnidentifiedItem));

        let ok = InwardDraft::new()
            .add_item(InwardItemDraft::linked("mat_1abc", 2))
            .add_item(InwardItemDraft::described("Copper wire", 1));
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn issue_draft_requires_every_field() {
        let draft = IssueDraft::new("mat_1abc", 5)
            .set_purpose("Maintenance")
            .set_officer("user_1abc");
        assert_eq!(
            draft.validate(),
            Err(ValidationError::MissingField("requesting department"))
        );
        assert_eq!(
            IssueDraft::new("mat_1abc", 0).validate(),
            Err(ValidationError::NonPositiveQuantity)
        );
    }

    #[test]
    fn material_and_user_drafts() {
        assert!(MaterialDraft::new("MAT-001", "Widget").validate().is_ok());
        assert!(MaterialDraft::new("", "Widget").validate().is_err());
        assert!(NewUser::new("gate", "", Role::Security).validate().is_err());
    }
}

// STATE MACHINE TESTS
#[cfg(test)]
mod state_tests {
    use super::*;

    #[test]
    fn gate_entry_happy_path() {
        let status = GateEntryStatus::PendingOfficerApproval1
            .apply(EntryEvent::StageOneApproved)
            .and_then(|s| s.apply(EntryEvent::StoreProcessed))
            .and_then(|s| s.apply(EntryEvent::FinalApproved));
        assert_eq!(status, Some(GateEntryStatus::FinalApproved));
    }

    #[test]
    fn store_cannot_skip_stage_one() {
        assert_eq!(
            GateEntryStatus::PendingOfficerApproval1.apply(EntryEvent::StoreProcessed),
            None
        );
    }

    #[test]
    fn issue_decisions_only_from_pending() {
        assert_eq!(
            IssueStatus::PendingOfficerApproval.apply(IssueEvent::Rejected),
            Some(IssueStatus::Rejected)
        );
        assert_eq!(IssueStatus::Rejected.apply(IssueEvent::Approved), None);
        assert_eq!(IssueStatus::Approved.to_string(), "APPROVED");
    }
}

// AUTHORIZATION TESTS
#[cfg(test)]
mod auth_tests {
    use super::*;

    fn principal(id: &str, role: Role, active: bool) -> Principal {
        Principal {
            id: id.to_string(),
            username: id.to_string(),
            role,
            active,
        }
    }

    #[test]
    fn admin_is_permitted_everything() {
        for action in Action::ALL {
            assert!(auth::permits(Role::Admin, action), "admin refused {action}");
        }
    }

    #[test]
    fn security_only_works_the_gate() {
        assert!(auth::permits(Role::Security, Action::CreateGateEntry));
        assert!(!auth::permits(Role::Security, Action::DecideStageOne));
        assert!(!auth::permits(Role::Security, Action::ViewStoreInventory));
        assert!(!auth::permits(Role::StoreManager, Action::CreateGateEntry));
    }

    #[test]
    fn inactive_principals_are_refused() {
        let officer = principal("user_1a", Role::Officer, false);
        let err = auth::authorize(&officer, Action::ViewOfficerQueue).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::AuthorizationDenied {
                reason: Denial::Inactive,
                ..
            }
        ));
    }

    #[test]
    fn store_manager_is_not_bound_to_receipt_assignee() {
        let store = principal("user_1s", Role::StoreManager, true);
        let officer = principal("user_1a", Role::Officer, true);
        assert!(auth::authorize_assignee(&store, Action::ViewReceipt, "user_1z").is_ok());
        assert!(auth::authorize_assignee(&officer, Action::ViewReceipt, "user_1z").is_err());
        assert!(auth::authorize_assignee(&officer, Action::ViewReceipt, "user_1a").is_ok());
    }
}
