use serde::Deserialize;
use uuid::Uuid;

use super::value_objects::{DeliveryMethod, OrderStatus, PaymentMethod};

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

/// Put a product into an order. Exactly one of `flower`/`bouquet` must be set;
/// that is checked by validation so both mistakes get a field-level message.
#[derive(Debug, Clone, Deserialize)]
pub struct AddLineItem {
    #[serde(default)]
    pub flower: Option<Uuid>,
    #[serde(default)]
    pub bouquet: Option<Uuid>,
    pub quantity: u32,
}

impl AddLineItem {
    pub fn flower(id: Uuid, quantity: u32) -> Self {
        Self { flower: Some(id), bouquet: None, quantity }
    }

    pub fn bouquet(id: Uuid, quantity: u32) -> Self {
        Self { flower: None, bouquet: Some(id), quantity }
    }
}

/// Only the quantity of an existing line can change; the product is fixed.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateLineItem {
    pub quantity: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayOrder {
    pub method: PaymentMethod,
}

/// Partial update of delivery details; absent fields are left untouched.
/// `notes` belongs to staff and is not client-writable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateOrderDetails {
    pub delivery_method: Option<DeliveryMethod>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
}

/// Back-office status change (preparation, delivery, cancellation, refund).
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionStatus {
    pub status: OrderStatus,
}
