// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// - catalog: flowers and bouquets as the order workflow sees them
// - order: carts, line-item merge, validation, payment completion
//
// ============================================================================

pub mod catalog;
pub mod order;
