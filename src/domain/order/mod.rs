// ============================================================================
// Order Domain - carts, line items, payment and status
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (Order, LineItem, Payment, OrderStatus)
// - Commands (AddLineItem, PayOrder, etc.)
// - Errors (OrderError, FieldErrors)
// - Validation rules (product reference, quantity limits, stock, mutability)
// - Views (what the API returns)
// - Command Handler (OrderCommandHandler)
//
// Storage is reached only through the traits in `crate::store`.
//
// ============================================================================

pub mod value_objects;
pub mod commands;
pub mod errors;
pub mod validation;
pub mod views;
pub mod command_handler;

// Re-export for convenience
pub use value_objects::*;
pub use commands::*;
pub use errors::*;
pub use views::*;
pub use command_handler::*;
