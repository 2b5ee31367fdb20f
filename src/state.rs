//! Gate entry and material issue state machines.
//!
//! Both machines are pure: `apply` maps a status and an event to the next
//! status, or `None` when the event is not valid from that status. The
//! workflow turns `None` into a state conflict without touching the record.

use crate::model::{GateEntryStatus, IssueStatus};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryEvent {
    StageOneApproved,
    StageOneRejected,
    StoreProcessed,
    FinalApproved,
    FinalRejected,
}

impl EntryEvent {
    /// The only status from which this event may fire.
    pub fn required_status(&self) -> GateEntryStatus {
        match self {
            EntryEvent::StageOneApproved | EntryEvent::StageOneRejected => {
                GateEntryStatus::PendingOfficerApproval1
            }
            EntryEvent::StoreProcessed => GateEntryStatus::ApprovedStage1,
            EntryEvent::FinalApproved | EntryEvent::FinalRejected => {
                GateEntryStatus::PendingOfficerFinalApproval
            }
        }
    }
}

impl GateEntryStatus {
    pub const ALL: [GateEntryStatus; 6] = [
        GateEntryStatus::PendingOfficerApproval1,
        GateEntryStatus::ApprovedStage1,
        GateEntryStatus::RejectedStage1,
        GateEntryStatus::PendingOfficerFinalApproval,
        GateEntryStatus::FinalApproved,
        GateEntryStatus::Rejected,
    ];

    pub fn apply(self, event: EntryEvent) -> Option<GateEntryStatus> {
        use GateEntryStatus::*;

        match (self, event) {
            (PendingOfficerApproval1, EntryEvent::StageOneApproved) => Some(ApprovedStage1),
            (PendingOfficerApproval1, EntryEvent::StageOneRejected) => Some(RejectedStage1),
            (ApprovedStage1, EntryEvent::StoreProcessed) => Some(PendingOfficerFinalApproval),
            (PendingOfficerFinalApproval, EntryEvent::FinalApproved) => Some(FinalApproved),
            (PendingOfficerFinalApproval, EntryEvent::FinalRejected) => Some(Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GateEntryStatus::RejectedStage1 | GateEntryStatus::FinalApproved | GateEntryStatus::Rejected
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GateEntryStatus::PendingOfficerApproval1 => "PENDING_OFFICER_APPROVAL_1",
            GateEntryStatus::ApprovedStage1 => "APPROVED_STAGE_1",
            GateEntryStatus::RejectedStage1 => "REJECTED_STAGE_1",
            GateEntryStatus::PendingOfficerFinalApproval => "PENDING_OFFICER_FINAL_APPROVAL",
            GateEntryStatus::FinalApproved => "FINAL_APPROVED",
            GateEntryStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for GateEntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueEvent {
    Approved,
    Rejected,
}

impl IssueStatus {
    pub fn apply(self, event: IssueEvent) -> Option<IssueStatus> {
        match (self, event) {
            (IssueStatus::PendingOfficerApproval, IssueEvent::Approved) => Some(IssueStatus::Approved),
            (IssueStatus::PendingOfficerApproval, IssueEvent::Rejected) => Some(IssueStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, IssueStatus::PendingOfficerApproval)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::PendingOfficerApproval => "PENDING_OFFICER_APPROVAL",
            IssueStatus::Approved => "APPROVED",
            IssueStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
