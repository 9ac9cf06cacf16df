use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::domain::catalog::ProductRef;
use crate::store::StoreError;
use crate::utils::IsTransient;

// ============================================================================
// Field-level validation messages
// ============================================================================

/// Validation messages keyed by the request field they refer to.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    #[cfg(test)]
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `Ok(())` when nothing was recorded, otherwise a validation error.
    pub fn into_result(self) -> Result<(), OrderError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(OrderError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Invalid input: {0}")]
    Validation(FieldErrors),

    #[error("{0}")]
    InvalidState(String),

    #[error("Cannot pay for empty order")]
    EmptyOrder,

    #[error("Product is not available: {0}")]
    ProductUnavailable(ProductRef),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: Uuid },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OrderError {
    pub fn order_not_found(id: Uuid) -> Self {
        OrderError::NotFound { kind: "Order", id }
    }

    pub fn item_not_found(id: Uuid) -> Self {
        OrderError::NotFound { kind: "Order item", id }
    }

    pub fn product_not_found(product: ProductRef) -> Self {
        let kind = match product {
            ProductRef::Flower(_) => "Flower",
            ProductRef::Bouquet(_) => "Bouquet",
        };
        OrderError::NotFound { kind, id: product.id() }
    }

    /// Stable identifier clients can branch on.
    pub fn code(&self) -> &'static str {
        match self {
            OrderError::Validation(_) => "validation_error",
            OrderError::InvalidState(_) => "invalid_state",
            OrderError::EmptyOrder => "empty_order",
            OrderError::ProductUnavailable(_) => "product_unavailable",
            OrderError::NotFound { .. } => "not_found",
            OrderError::Store(_) => "internal_error",
        }
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            OrderError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl IsTransient for OrderError {
    /// Only a lost race on the (order, product) uniqueness backstop is worth
    /// another attempt; the retry re-reads and merges into the winning row.
    fn is_transient(&self) -> bool {
        matches!(self, OrderError::Store(StoreError::UniqueViolation(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_errors_collect_per_field() {
        let mut errors = FieldErrors::new();
        errors.add("flower", "first");
        errors.add("flower", "second");
        errors.add("bouquet", "third");

        assert_eq!(errors.get("flower").unwrap().len(), 2);
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["bouquet", "flower"]);
        assert_eq!(errors.to_string(), "bouquet: third; flower: first; flower: second");
    }

    #[test]
    fn test_empty_field_errors_are_ok() {
        assert!(FieldErrors::new().into_result().is_ok());
        let err = FieldErrors::single("quantity", "too big").into_result().unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn test_only_unique_violations_are_transient() {
        let race = OrderError::Store(StoreError::UniqueViolation("order_items".into()));
        assert!(race.is_transient());
        assert!(!OrderError::EmptyOrder.is_transient());
        assert!(!OrderError::Store(StoreError::Corrupt("bad row".into())).is_transient());
    }

    #[test]
    fn test_not_found_message_names_the_kind() {
        let id = Uuid::new_v4();
        let err = OrderError::product_not_found(ProductRef::Bouquet(id));
        assert_eq!(err.to_string(), format!("Bouquet not found: {id}"));
        assert_eq!(err.code(), "not_found");
    }
}
