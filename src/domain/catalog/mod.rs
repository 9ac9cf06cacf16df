// ============================================================================
// Catalog Domain - Products the shop sells
// ============================================================================
//
// Flowers and bouquets as the order workflow sees them: price, order limit,
// and availability. Products are looked up through `OrderTx::product` in
// crate::store.
//
// ============================================================================

pub mod value_objects;

pub use value_objects::*;
