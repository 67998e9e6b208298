//! Non-fatal data inconsistencies.
//!
//! These are reported next to a computed result; they never replace it.

use serde::{Deserialize, Serialize};

use crate::id::ProductId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InconsistencyWarning {
    /// The fold produced a negative on-hand quantity (usually a missing receipt).
    NegativeQuantity { product_id: ProductId, quantity: f64 },
    /// The backend reports a different on-hand quantity than the movements imply.
    QuantityDivergence {
        product_id: ProductId,
        reported: f64,
        computed: f64,
    },
}

impl InconsistencyWarning {
    pub fn product_id(&self) -> ProductId {
        match self {
            InconsistencyWarning::NegativeQuantity { product_id, .. }
            | InconsistencyWarning::QuantityDivergence { product_id, .. } => *product_id,
        }
    }
}

impl core::fmt::Display for InconsistencyWarning {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            InconsistencyWarning::NegativeQuantity {
                product_id,
                quantity,
            } => write!(
                f,
                "product {product_id} has negative computed quantity {quantity:.4}"
            ),
            InconsistencyWarning::QuantityDivergence {
                product_id,
                reported,
                computed,
            } => write!(
                f,
                "product {product_id}: backend reports {reported:.4}, movements imply {computed:.4}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_with_a_type_tag() {
        let w = InconsistencyWarning::NegativeQuantity {
            product_id: ProductId::new(7),
            quantity: -3.0,
        };
        assert_eq!(
            serde_json::to_value(&w).unwrap(),
            json!({"type": "negative_quantity", "product_id": 7, "quantity": -3.0})
        );
        assert_eq!(w.product_id(), ProductId::new(7));
    }

    #[test]
    fn divergence_message_names_both_quantities() {
        let w = InconsistencyWarning::QuantityDivergence {
            product_id: ProductId::new(7),
            reported: 105.0,
            computed: 100.0,
        };
        assert_eq!(
            w.to_string(),
            "product 7: backend reports 105.0000, movements imply 100.0000"
        );
    }
}
