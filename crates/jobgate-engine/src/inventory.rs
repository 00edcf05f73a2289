//! Material inventory sufficiency

use crate::types::InventoryRecord;

/// Quantity available for one material across all its records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Availability {
    pub quantity: i64,
    /// Id of the last matching record, which receives the decrement.
    /// Only exact when a material has a single record.
    pub material_id: Option<String>,
}

impl Availability {
    /// A request is satisfiable iff `0 < requested <= available`
    pub fn satisfies(&self, requested: i64) -> bool {
        requested > 0 && requested <= self.quantity
    }
}

/// Sum `coupon_quantity` over the records of `material_name`
pub fn available_quantity(material_name: &str, records: &[InventoryRecord]) -> Availability {
    records
        .iter()
        .filter(|record| record.coupon_material == material_name)
        .fold(
            Availability {
                quantity: 0,
                material_id: None,
            },
            |acc, record| Availability {
                quantity: acc.quantity.saturating_add(record.coupon_quantity),
                material_id: Some(record.material_id.clone()),
            },
        )
}

pub fn shortage_message(material_name: &str, available: i64) -> String {
    format!("Available {material_name} coupon quantity is {available}")
}
