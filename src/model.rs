//! Ledger entity records, persisted as CBOR
use crate::types::{Role, TimeStamp};
use chrono::Utc;

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct User {
    #[n(0)]
    pub id: String, // bech32, hrp user_
    #[n(1)]
    pub username: String,
    #[n(2)]
    pub password_hash: String, // bcrypt, salt embedded
    #[n(3)]
    pub role: Role,
    #[n(4)]
    pub active: bool,
    #[n(5)]
    pub created_at: TimeStamp<Utc>,
}

impl User {
    pub fn is_active_officer(&self) -> bool {
        self.active && self.role == Role::Officer
    }
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Material {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub code: String,
    #[n(2)]
    pub name: String,
    #[n(3)]
    pub description: Option<String>,
    #[n(4)]
    pub category: String,
    #[n(5)]
    pub unit: String,
    #[n(6)]
    pub min_stock_level: u64,
    #[n(7)]
    pub current_stock: u64, // running total of every posting in the log
    #[n(8)]
    pub created_at: TimeStamp<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
pub enum GateEntryStatus {
    #[n(0)]
    PendingOfficerApproval1,
    #[n(1)]
    ApprovedStage1,
    #[n(2)]
    RejectedStage1,
    #[n(3)]
    PendingOfficerFinalApproval,
    #[n(4)]
    FinalApproved,
    #[n(5)]
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct GateEntry {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub gate_pass_number: String,
    #[n(2)]
    pub vendor_name: String,
    #[n(3)]
    pub vendor_location: Option<String>,
    #[n(4)]
    pub vehicle_number: Option<String>,
    #[n(5)]
    pub driver_name: Option<String>,
    #[n(6)]
    pub driver_phone: Option<String>,
    #[n(7)]
    pub material_type_desc: Option<String>,
    #[n(8)]
    pub approx_quantity: Option<u64>,
    #[n(9)]
    pub created_by: String,
    #[n(10)]
    pub request_officer: String, // fixed at creation
    #[n(11)]
    pub status: GateEntryStatus,
    #[n(12)]
    pub remarks: Option<String>,
    #[n(13)]
    pub created_at: TimeStamp<Utc>,
    #[n(14)]
    pub updated_at: TimeStamp<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct InwardItem {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub material_id: Option<String>,
    #[n(2)]
    pub material_description: Option<String>,
    #[n(3)]
    pub category: Option<String>,
    #[n(4)]
    pub unit: Option<String>,
    #[n(5)]
    pub quantity_received: u64,
    #[n(6)]
    pub store_room: Option<String>,
    #[n(7)]
    pub rack_no: Option<String>,
    #[n(8)]
    pub shelf_no: Option<String>,
}

/// Store manager's physical verification of one gate entry. Stored under the
/// gate entry id, so an entry can never carry two.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct InwardProcess {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub gate_entry_id: String,
    #[n(2)]
    pub invoice_no: Option<String>,
    #[n(3)]
    pub invoice_date: Option<TimeStamp<Utc>>,
    #[n(4)]
    pub remarks: Option<String>,
    #[n(5)]
    pub physical_check_done: bool,
    #[n(6)]
    pub processed_by: String,
    #[n(7)]
    pub processed_at: TimeStamp<Utc>,
    #[n(8)]
    pub final_approved_by: Option<String>,
    #[n(9)]
    pub final_approved_at: Option<TimeStamp<Utc>>,
    #[n(10)]
    pub items: Vec<InwardItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum TransactionType {
    #[n(0)]
    Inward,
    #[n(1)]
    Issue,
    #[n(2)]
    Adjustment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Inward => "INWARD",
            TransactionType::Issue => "ISSUE",
            TransactionType::Adjustment => "ADJUSTMENT",
        }
    }
}

/// Append-only stock posting.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct InventoryLog {
    #[n(0)]
    pub id: String, // uuid7, sorts in posting order
    #[n(1)]
    pub material_id: String,
    #[n(2)]
    pub change_quantity: i64,
    #[n(3)]
    pub balance_after: u64,
    #[n(4)]
    pub transaction_type: TransactionType,
    #[n(5)]
    pub reference_id: String,
    #[n(6)]
    pub remarks: Option<String>,
    #[n(7)]
    pub created_by: String,
    #[n(8)]
    pub created_at: TimeStamp<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
pub enum IssueStatus {
    #[n(0)]
    PendingOfficerApproval,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct MaterialIssue {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub material_id: String,
    #[n(2)]
    pub quantity_requested: u64,
    #[n(3)]
    pub purpose: String,
    #[n(4)]
    pub requesting_dept: String,
    #[n(5)]
    pub officer_id: String, // designated approver
    #[n(6)]
    pub requested_by: String,
    #[n(7)]
    pub requested_at: TimeStamp<Utc>,
    #[n(8)]
    pub status: IssueStatus,
    #[n(9)]
    pub approved_by: Option<String>,
    #[n(10)]
    pub approved_at: Option<TimeStamp<Utc>>,
    #[n(11)]
    pub issue_note_id: Option<String>,
    #[n(12)]
    pub remarks: Option<String>,
}

impl MaterialIssue {
    /// Ledger reference for the posting made when this issue is approved.
    pub fn ledger_reference(&self) -> String {
        format!("ISS-{}", self.id)
    }
}
