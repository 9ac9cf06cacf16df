use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::catalog::ProductRef;

// ============================================================================
// Order Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    WaitingPayment,
    Paid,
    Preparing,
    InDelivery,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::WaitingPayment,
        OrderStatus::Paid,
        OrderStatus::Preparing,
        OrderStatus::InDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::WaitingPayment => "waiting_payment",
            OrderStatus::Paid => "paid",
            OrderStatus::Preparing => "preparing",
            OrderStatus::InDelivery => "in_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    /// Line items and delivery details may change only in these states.
    pub fn is_mutable(&self) -> bool {
        matches!(
            self,
            OrderStatus::WaitingPayment | OrderStatus::Paid | OrderStatus::Preparing
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (WaitingPayment, Paid)
                | (WaitingPayment, Cancelled)
                | (Paid, Preparing)
                | (Paid, Refunded)
                | (Preparing, InDelivery)
                | (InDelivery, Delivered)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown order status: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Blik,
    Paypal,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Blik => "blik",
            PaymentMethod::Paypal => "paypal",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blik" => Ok(PaymentMethod::Blik),
            "paypal" => Ok(PaymentMethod::Paypal),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    Pickup,
    Courier,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMethod::Pickup => "pickup",
            DeliveryMethod::Courier => "courier",
        }
    }
}

impl FromStr for DeliveryMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pickup" => Ok(DeliveryMethod::Pickup),
            "courier" => Ok(DeliveryMethod::Courier),
            other => Err(format!("unknown delivery method: {other}")),
        }
    }
}

/// Where and how a finished order reaches the customer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryDetails {
    pub delivery_method: Option<DeliveryMethod>,
    pub notes: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    /// Empty once the owning account has been removed; the order is kept.
    pub user_id: Option<Uuid>,
    pub status: OrderStatus,
    #[serde(flatten)]
    pub details: DeliveryDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// A fresh, empty cart for `user_id`.
    pub fn new(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id: Some(user_id),
            status: OrderStatus::WaitingPayment,
            details: DeliveryDetails::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == Some(user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product: ProductRef,
    pub quantity: u32,
}

impl LineItem {
    pub fn new(order_id: Uuid, product: ProductRef, quantity: u32) -> Self {
        Self {
            id: Uuid::now_v7(),
            order_id,
            product,
            quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Payments settle instantly; there is no gateway round-trip.
    pub fn completed(order_id: Uuid, method: PaymentMethod) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            order_id,
            method,
            status: PaymentStatus::Completed,
            created_at: now,
            completed_at: Some(now),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_order_is_waiting_payment() {
        let user_id = Uuid::new_v4();
        let order = Order::new(user_id);

        assert_eq!(order.status, OrderStatus::WaitingPayment);
        assert!(order.is_owned_by(user_id));
        assert!(!order.is_owned_by(Uuid::new_v4()));
    }

    #[test]
    fn test_order_status_round_trips_through_str() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_order_status_wire_names_match_storage_names() {
        for status in OrderStatus::ALL {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, status.as_str());
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        use OrderStatus::*;
        assert!(WaitingPayment.can_transition_to(Paid));
        assert!(Paid.can_transition_to(Preparing));
        assert!(Preparing.can_transition_to(InDelivery));
        assert!(InDelivery.can_transition_to(Delivered));
        assert!(WaitingPayment.can_transition_to(Cancelled));
        assert!(Paid.can_transition_to(Refunded));
    }

    #[test]
    fn test_rejected_transitions() {
        use OrderStatus::*;
        assert!(!Paid.can_transition_to(WaitingPayment));
        assert!(!Preparing.can_transition_to(Cancelled));
        assert!(!WaitingPayment.can_transition_to(Delivered));
        for next in OrderStatus::ALL {
            assert!(!Delivered.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
            assert!(!Refunded.can_transition_to(next));
        }
    }

    #[test]
    fn test_mutable_states() {
        let mutable: Vec<_> = OrderStatus::ALL.into_iter().filter(|s| s.is_mutable()).collect();
        assert_eq!(
            mutable,
            vec![OrderStatus::WaitingPayment, OrderStatus::Paid, OrderStatus::Preparing]
        );
        assert!(!OrderStatus::InDelivery.is_mutable());
        assert!(!OrderStatus::InDelivery.is_terminal());
    }

    #[test]
    fn test_completed_payment_has_completion_time() {
        let payment = Payment::completed(Uuid::new_v4(), PaymentMethod::Blik);
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.completed_at, Some(payment.created_at));
    }

    #[test]
    fn test_payment_method_parsing() {
        assert_eq!("blik".parse::<PaymentMethod>(), Ok(PaymentMethod::Blik));
        assert_eq!("paypal".parse::<PaymentMethod>(), Ok(PaymentMethod::Paypal));
        assert!("card".parse::<PaymentMethod>().is_err());
        let method: PaymentMethod = serde_json::from_str("\"paypal\"").unwrap();
        assert_eq!(method, PaymentMethod::Paypal);
    }

    #[test]
    fn test_order_serializes_details_inline() {
        let mut order = Order::new(Uuid::new_v4());
        order.details.city = Some("Kraków".to_string());

        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["city"], "Kraków");
        assert_eq!(json["status"], "waiting_payment");
    }
}
