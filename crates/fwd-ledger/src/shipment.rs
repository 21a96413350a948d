//! Shipment record.
//!
//! Shipments are owned by the operations side of the back office; the
//! financial core keeps the reference data it validates against and owns
//! only `invoice_status`.

use serde::{Deserialize, Serialize};

use fwd_core::{ShipmentId, Timestamp, ValidationError};
use fwd_state::InvoiceStatus;

const MAX_REFERENCE_LEN: usize = 64;

/// A shipment and its invoice rollup status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    /// Shipment id.
    pub id: ShipmentId,
    /// Human-facing reference (booking or job number).
    pub reference: String,
    /// Customer name, if known.
    pub customer_name: Option<String>,
    /// Rollup of the shipment's invoices.
    pub invoice_status: InvoiceStatus,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub updated_at: Timestamp,
}

/// Input for registering a shipment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewShipment {
    /// Human-facing reference.
    pub reference: String,
    /// Customer name.
    #[serde(default)]
    pub customer_name: Option<String>,
}

impl Shipment {
    /// Register a shipment with no invoices (`DRAFT` rollup).
    pub fn create(new: NewShipment, now: Timestamp) -> Result<Self, ValidationError> {
        let reference = new.reference.trim().to_string();
        if reference.is_empty() {
            return Err(ValidationError::EmptyField("reference"));
        }
        if reference.len() > MAX_REFERENCE_LEN {
            return Err(ValidationError::TooLong {
                field: "reference",
                max: MAX_REFERENCE_LEN,
            });
        }
        Ok(Self {
            id: ShipmentId::new(),
            reference,
            customer_name: new
                .customer_name
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            invoice_status: InvoiceStatus::Draft,
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_shipment_starts_draft() {
        let s = Shipment::create(
            NewShipment {
                reference: " SHP-1001 ".to_string(),
                customer_name: Some("Acme".to_string()),
            },
            Timestamp::now(),
        )
        .unwrap();
        assert_eq!(s.reference, "SHP-1001");
        assert_eq!(s.invoice_status, InvoiceStatus::Draft);
    }

    #[test]
    fn blank_reference_rejected() {
        let err = Shipment::create(
            NewShipment {
                reference: "  ".to_string(),
                customer_name: None,
            },
            Timestamp::now(),
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::EmptyField("reference"));
    }
}
