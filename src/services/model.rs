//! Business objects passed between the mesh services

use serde::{Deserialize, Serialize};

/// Price of one item, in cents
pub const UNIT_PRICE_CENTS: u64 = 110_001;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub customer: String,
    pub name: String,
    pub quantity: u64,
    #[serde(default)]
    pub order_number: u64,
}

impl Order {
    pub fn new(customer: impl Into<String>, name: impl Into<String>, quantity: u64) -> Self {
        Self {
            customer: customer.into(),
            name: name.into(),
            quantity,
            order_number: 0,
        }
    }

    /// The order attacks try to sneak into a store
    pub fn planted() -> Self {
        Self {
            customer: "hacker".to_string(),
            name: "loot".to_string(),
            quantity: 1_234_567_890,
            order_number: 666,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub order_number: u64,
    #[serde(default)]
    pub payment_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub customer: String,
    pub invoice_number: u64,
    pub total_cents: u64,
}

impl Invoice {
    pub fn for_order(order: &Order, invoice_number: u64) -> Self {
        Self {
            customer: order.customer.clone(),
            invoice_number,
            total_cents: order.quantity.saturating_mul(UNIT_PRICE_CENTS),
        }
    }
}
