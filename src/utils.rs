//! Identifier generation

use bech32::Bech32m;
use uuid7::uuid7;

use crate::error::WorkflowError;

// construct a unique entity id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> Result<String, WorkflowError> {
    let hrp = bech32::Hrp::parse(hrp).map_err(|e| WorkflowError::Identifier(e.to_string()))?;
    let encoded = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())
        .map_err(|e| WorkflowError::Identifier(e.to_string()))?;
    Ok(encoded)
}

/// Time ordered id, used where keys must scan in insertion order.
pub fn new_sequence_id() -> String {
    uuid7().to_string()
}

// the tail of a uuid7 is random, the head is the timestamp
fn short_token() -> String {
    hex::encode_upper(&uuid7().as_bytes()[12..16])
}

pub fn new_gate_pass_number() -> String {
    format!("GP-{}", short_token())
}

pub fn new_issue_note_id() -> String {
    format!("NOTE-{}", short_token())
}

pub fn new_adjustment_reference() -> String {
    format!("ADJ-{}", short_token())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_pass_has_prefix_and_hex_token() {
        let gate_pass = new_gate_pass_number();

        assert!(gate_pass.starts_with("GP-"));
        assert_eq!(gate_pass.len(), 11);
        assert!(
            gate_pass[3..]
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }

    #[test]
    fn sequence_ids_sort_in_creation_order() {
        let first = new_sequence_id();
        let second = new_sequence_id();

        assert!(first < second);
    }
}
