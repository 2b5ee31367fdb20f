//! Request drafts built by the boundary and validated before any transaction
//! begins.
use crate::error::ValidationError;
use crate::types::{Role, TimeStamp};
use chrono::Utc;

fn present<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, ValidationError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField(field)),
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Security's intake record for a vehicle arriving at the gate.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GateEntryDraft {
    pub(crate) vendor_name: Option<String>,
    pub(crate) vendor_location: Option<String>,
    pub(crate) vehicle_number: Option<String>,
    pub(crate) driver_name: Option<String>,
    pub(crate) driver_phone: Option<String>,
    pub(crate) material_type_desc: Option<String>,
    pub(crate) approx_quantity: Option<u64>,
    pub(crate) request_officer_id: Option<String>,
}

impl GateEntryDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_vendor_name(mut self, name: &str) -> Self {
        self.vendor_name = non_blank(name);
        self
    }
    pub fn set_vendor_location(mut self, location: &str) -> Self {
        self.vendor_location = non_blank(location);
        self
    }
    pub fn set_vehicle_number(mut self, number: &str) -> Self {
        self.vehicle_number = non_blank(number);
        self
    }
    pub fn set_driver(mut self, name: &str, phone: &str) -> Self {
        self.driver_name = non_blank(name);
        self.driver_phone = non_blank(phone);
        self
    }
    pub fn set_material_type_desc(mut self, desc: &str) -> Self {
        self.material_type_desc = non_blank(desc);
        self
    }
    pub fn set_approx_quantity(mut self, quantity: u64) -> Self {
        self.approx_quantity = Some(quantity);
        self
    }
    pub fn set_request_officer(mut self, officer_id: &str) -> Self {
        self.request_officer_id = non_blank(officer_id);
        self
    }
    pub fn validate(&self) -> Result<(), ValidationError> {
        present(&self.vendor_name, "vendor name")?;
        present(&self.request_officer_id, "request officer")?;
        if self.approx_quantity == Some(0) {
            return Err(ValidationError::NonPositiveQuantity);
        }
        Ok(())
    }
}

/// One physically received line. Either linked to a material or described.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InwardItemDraft {
    pub(crate) material_id: Option<String>,
    pub(crate) material_description: Option<String>,
    pub(crate) category: Option<String>,
    pub(crate) unit: Option<String>,
    pub(crate) quantity_received: u64,
    pub(crate) store_room: Option<String>,
    pub(crate) rack_no: Option<String>,
    pub(crate) shelf_no: Option<String>,
}

impl InwardItemDraft {
    pub fn linked(material_id: &str, quantity_received: u64) -> Self {
        Self {
            material_id: non_blank(material_id),
            quantity_received,
            ..Self::default()
        }
    }
    pub fn described(description: &str, quantity_received: u64) -> Self {
        Self {
            material_description: non_blank(description),
            quantity_received,
            ..Self::default()
        }
    }
    pub fn set_description(mut self, description: &str) -> Self {
        self.material_description = non_blank(description);
        self
    }
    pub fn set_category(mut self, category: &str) -> Self {
        self.category = non_blank(category);
        self
    }
    pub fn set_unit(mut self, unit: &str) -> Self {
        self.unit = non_blank(unit);
        self
    }
    pub fn set_location(mut self, store_room: &str, rack_no: &str, shelf_no: &str) -> Self {
        self.store_room = non_blank(store_room);
        self.rack_no = non_blank(rack_no);
        self.shelf_no = non_blank(shelf_no);
        self
    }
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.quantity_received == 0 {
            return Err(ValidationError::NonPositiveQuantity);
        }
        if self.material_id.is_none() && self.material_description.is_none() {
            return Err(ValidationError::UnidentifiedItem);
        }
        Ok(())
    }
}

/// Store manager's verification of an approved gate entry.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InwardDraft {
    pub(crate) invoice_no: Option<String>,
    pub(crate) invoice_date: Option<TimeStamp<Utc>>,
    pub(crate) remarks: Option<String>,
    pub(crate) items: Vec<InwardItemDraft>,
}

impl InwardDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_invoice(mut self, invoice_no: &str, invoice_date: TimeStamp<Utc>) -> Self {
        self.invoice_no = non_blank(invoice_no);
        self.invoice_date = Some(invoice_date);
        self
    }
    pub fn set_remarks(mut self, remarks: &str) -> Self {
        self.remarks = non_blank(remarks);
        self
    }
    pub fn add_item(mut self, item: InwardItemDraft) -> Self {
        self.items.push(item);
        self
    }
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.items.is_empty() {
            return Err(ValidationError::NoItems);
        }
        self.items.iter().try_for_each(InwardItemDraft::validate)
    }
}

/// Partial edit of one inward item, matched by id. `None` leaves a field as is.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InwardItemUpdate {
    pub(crate) id: String,
    pub(crate) material_id: Option<String>,
    pub(crate) material_description: Option<String>,
    pub(crate) category: Option<String>,
    pub(crate) unit: Option<String>,
    pub(crate) quantity_received: Option<u64>,
    pub(crate) store_room: Option<String>,
    pub(crate) rack_no: Option<String>,
    pub(crate) shelf_no: Option<String>,
}

impl InwardItemUpdate {
    pub fn new(item_id: &str) -> Self {
        Self {
            id: item_id.to_string(),
            ..Self::default()
        }
    }
    pub fn set_material(mut self, material_id: &str) -> Self {
        self.material_id = non_blank(material_id);
        self
    }
    pub fn set_description(mut self, description: &str) -> Self {
        self.material_description = non_blank(description);
        self
    }
    pub fn set_category(mut self, category: &str) -> Self {
        self.category = non_blank(category);
        self
    }
    pub fn set_unit(mut self, unit: &str) -> Self {
        self.unit = non_blank(unit);
        self
    }
    pub fn set_quantity(mut self, quantity: u64) -> Self {
        self.quantity_received = Some(quantity);
        self
    }
    pub fn set_store_room(mut self, store_room: &str) -> Self {
        self.store_room = non_blank(store_room);
        self
    }
    pub fn set_rack_no(mut self, rack_no: &str) -> Self {
        self.rack_no = non_blank(rack_no);
        self
    }
    pub fn set_shelf_no(mut self, shelf_no: &str) -> Self {
        self.shelf_no = non_blank(shelf_no);
        self
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InwardUpdate {
    pub(crate) invoice_no: Option<String>,
    pub(crate) invoice_date: Option<TimeStamp<Utc>>,
    pub(crate) remarks: Option<String>,
    pub(crate) items: Vec<InwardItemUpdate>,
}

impl InwardUpdate {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_invoice_no(mut self, invoice_no: &str) -> Self {
        self.invoice_no = non_blank(invoice_no);
        self
    }
    pub fn set_invoice_date(mut self, invoice_date: TimeStamp<Utc>) -> Self {
        self.invoice_date = Some(invoice_date);
        self
    }
    pub fn set_remarks(mut self, remarks: &str) -> Self {
        self.remarks = non_blank(remarks);
        self
    }
    pub fn update_item(mut self, item: InwardItemUpdate) -> Self {
        self.items.push(item);
        self
    }
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.items.iter().any(|i| i.quantity_received == Some(0)) {
            return Err(ValidationError::NonPositiveQuantity);
        }
        Ok(())
    }
}

/// Store manager's request to draw stock for a department.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IssueDraft {
    pub(crate) material_id: Option<String>,
    pub(crate) quantity_requested: u64,
    pub(crate) purpose: Option<String>,
    pub(crate) requesting_dept: Option<String>,
    pub(crate) officer_id: Option<String>,
}

impl IssueDraft {
    pub fn new(material_id: &str, quantity_requested: u64) -> Self {
        Self {
            material_id: non_blank(material_id),
            quantity_requested,
            ..Self::default()
        }
    }
    pub fn set_purpose(mut self, purpose: &str) -> Self {
        self.purpose = non_blank(purpose);
        self
    }
    pub fn set_requesting_dept(mut self, dept: &str) -> Self {
        self.requesting_dept = non_blank(dept);
        self
    }
    pub fn set_officer(mut self, officer_id: &str) -> Self {
        self.officer_id = non_blank(officer_id);
        self
    }
    pub fn validate(&self) -> Result<(), ValidationError> {
        present(&self.material_id, "material")?;
        if self.quantity_requested == 0 {
            return Err(ValidationError::NonPositiveQuantity);
        }
        present(&self.purpose, "purpose")?;
        present(&self.requesting_dept, "requesting department")?;
        present(&self.officer_id, "approving officer")?;
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MaterialDraft {
    pub(crate) code: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) category: Option<String>,
    pub(crate) unit: Option<String>,
    pub(crate) min_stock_level: u64,
}

impl MaterialDraft {
    pub fn new(code: &str, name: &str) -> Self {
        Self {
            code: non_blank(code),
            name: non_blank(name),
            ..Self::default()
        }
    }
    pub fn set_description(mut self, description: &str) -> Self {
        self.description = non_blank(description);
        self
    }
    pub fn set_category(mut self, category: &str) -> Self {
        self.category = non_blank(category);
        self
    }
    pub fn set_unit(mut self, unit: &str) -> Self {
        self.unit = non_blank(unit);
        self
    }
    pub fn set_min_stock_level(mut self, level: u64) -> Self {
        self.min_stock_level = level;
        self
    }
    pub fn validate(&self) -> Result<(), ValidationError> {
        present(&self.code, "material code")?;
        present(&self.name, "material name")?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub(crate) username: String,
    pub(crate) password: String,
    pub(crate) role: Role,
}

impl NewUser {
    pub fn new(username: &str, password: &str, role: Role) -> Self {
        Self {
            username: username.trim().to_string(),
            password: password.to_string(),
            role,
        }
    }
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.username.is_empty() {
            return Err(ValidationError::MissingField("username"));
        }
        if self.password.is_empty() {
            return Err(ValidationError::MissingField("password"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_entry_needs_vendor_and_officer() {
        let draft = GateEntryDraft::new().set_vendor_name("Acme");
        assert_eq!(
            draft.validate(),
            Err(ValidationError::MissingField("request officer"))
        );

        let draft = GateEntryDraft::new().set_request_officer("user_1abc");
        assert_eq!(draft.validate(), Err(ValidationError::MissingField("vendor name")));

        let draft = GateEntryDraft::new()
            .set_vendor_name("Acme")
            .set_request_officer("user_1abc");
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn blank_strings_count_as_missing() {
        let draft = GateEntryDraft::new()
            .set_vendor_name("   ")
            .set_request_officer("user_1abc");
        assert_eq!(draft.validate(), Err(ValidationError::MissingField("vendor name")));
    }

    #[test]
    fn inward_draft_rejects_empty_and_zero_quantity() {
        assert_eq!(InwardDraft::new().validate(), Err(ValidationError::NoItems));

        let draft = InwardDraft::new().add_item(InwardItemDraft::linked("mat_1", 0));
        assert_eq!(draft.validate(), Err(ValidationError::NonPositiveQuantity));
    }

    #[test]
    fn inward_item_must_be_identified() {
        let item = InwardItemDraft::default();
        let item = InwardItemDraft {
            quantity_received: 4,
            ..item
        };
        assert_eq!(item.validate(), Err(ValidationError::UnidentifiedItem));
        assert!(InwardItemDraft::described("Copper wire", 4).validate().is_ok());
    }

    #[test]
    fn issue_draft_requires_every_field() {
        let draft = IssueDraft::new("mat_1", 5)
            .set_purpose("maintenance")
            .set_requesting_dept("Electrical");
        assert_eq!(
            draft.validate(),
            Err(ValidationError::MissingField("approving officer"))
        );
        assert!(draft.set_officer("user_1abc").validate().is_ok());
    }
}
