//! Wire message sent to downstream price consumers.

use serde::{Deserialize, Serialize};

/// Price notification for one SKU (simple or bundle parent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceMessage {
    pub sku: String,
    pub price: f64,
    pub msrp: f64,
    pub cost: f64,
}

impl PriceMessage {
    pub fn new(sku: impl Into<String>, price: f64, msrp: f64, cost: f64) -> Self {
        Self {
            sku: sku.into(),
            price,
            msrp,
            cost,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_flat_fields() {
        let json = PriceMessage::new("SKU-1", 129.0, 150.0, 40.5).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["sku"], "SKU-1");
        assert_eq!(value["price"], 129.0);
        assert_eq!(value["msrp"], 150.0);
        assert_eq!(value["cost"], 40.5);
    }
}
