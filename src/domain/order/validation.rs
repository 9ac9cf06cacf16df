use crate::domain::catalog::{Product, ProductRef};

use super::commands::{AddLineItem, UpdateOrderDetails};
use super::errors::{FieldErrors, OrderError};
use super::value_objects::{DeliveryDetails, Order};

// ============================================================================
// Order Validation Rules
// ============================================================================

/// Resolve the flower/bouquet pair of a request into a single reference.
pub fn product_reference(command: &AddLineItem) -> Result<ProductRef, OrderError> {
    match (command.flower, command.bouquet) {
        (Some(flower), None) => Ok(ProductRef::Flower(flower)),
        (None, Some(bouquet)) => Ok(ProductRef::Bouquet(bouquet)),
        (None, None) => {
            let mut errors = FieldErrors::new();
            errors.add("flower", "Either flower or bouquet must be set.");
            errors.add("bouquet", "Either flower or bouquet must be set.");
            Err(OrderError::Validation(errors))
        }
        (Some(_), Some(_)) => {
            let mut errors = FieldErrors::new();
            errors.add("flower", "Only one of flower or bouquet may be set.");
            errors.add("bouquet", "Only one of flower or bouquet may be set.");
            Err(OrderError::Validation(errors))
        }
    }
}

fn check_quantity(product: &Product, quantity: u32, errors: &mut FieldErrors) {
    let limit = product.max_order_quantity();
    if quantity == 0 {
        errors.add("quantity", "Ensure this value is greater than or equal to 1.");
    } else if quantity > limit {
        errors.add(
            "quantity",
            format!("Ensure this value is less than or equal to {limit}."),
        );
    }
}

/// Quantity bounds for `product`, applied to the quantity a line will end up with.
pub fn validate_quantity(product: &Product, quantity: u32) -> Result<(), OrderError> {
    let mut errors = FieldErrors::new();
    check_quantity(product, quantity, &mut errors);
    errors.into_result()
}

/// Rules every line item must satisfy on create and on update.
pub fn validate_line_item(product: &Product, quantity: u32) -> Result<(), OrderError> {
    let mut errors = FieldErrors::new();
    if !product.sold_individually() {
        errors.add(
            product.reference().field(),
            "This flower is not sold individually.",
        );
    }
    check_quantity(product, quantity, &mut errors);
    errors.into_result()
}

/// Stock check at the moment an item is put into an order.
pub fn ensure_in_stock(product: &Product) -> Result<(), OrderError> {
    if product.is_available() {
        return Ok(());
    }
    let message = match product {
        Product::Flower(_) => "This flower is out of stock.",
        Product::Bouquet(_) => "This bouquet contains flowers that are out of stock.",
    };
    Err(OrderError::Validation(FieldErrors::single(
        product.reference().field(),
        message,
    )))
}

/// Stock check at payment time.
pub fn ensure_available(product: &Product) -> Result<(), OrderError> {
    if product.is_available() {
        Ok(())
    } else {
        Err(OrderError::ProductUnavailable(product.reference()))
    }
}

/// Line items and delivery details of an order can only change while it is
/// still being assembled or prepared.
pub fn ensure_mutable(order: &Order) -> Result<(), OrderError> {
    if order.status.is_mutable() {
        Ok(())
    } else {
        Err(OrderError::InvalidState(format!(
            "Order is {} and can no longer be changed",
            order.status
        )))
    }
}

/// Apply a partial details update, rejecting blank text fields.
pub fn apply_details(
    current: &DeliveryDetails,
    update: &UpdateOrderDetails,
) -> Result<DeliveryDetails, OrderError> {
    let mut errors = FieldErrors::new();
    let mut details = current.clone();

    let mut text = |field: &'static str, value: &Option<String>, target: &mut Option<String>| {
        if let Some(value) = value {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                errors.add(field, "This field may not be blank.");
            } else {
                *target = Some(trimmed.to_string());
            }
        }
    };

    text("address_line1", &update.address_line1, &mut details.address_line1);
    text("address_line2", &update.address_line2, &mut details.address_line2);
    text("city", &update.city, &mut details.city);
    text("postal_code", &update.postal_code, &mut details.postal_code);

    if let Some(method) = update.delivery_method {
        details.delivery_method = Some(method);
    }

    errors.into_result()?;
    Ok(details)
}
