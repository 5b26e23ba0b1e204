// ============================================================================
// MERIDIAN COMMERCE - INVENTORY CORE
// ============================================================================
// Module: inventory/src/lib.rs
// Description: Inventory ledger, stock movements, transfer workflow, cycle
//              counts and the append-only audit trail
// ============================================================================

pub mod handlers;
pub mod models;
pub mod services;
pub mod store;

#[cfg(test)]
mod tests;

pub use handlers::{inventory_routes, InventoryState};
pub use services::{
    AuditLogger, CycleCountService, MovementPolicy, MovementService, StockUpdateService,
    TransferService,
};
pub use store::{InventoryStore, MemoryInventoryStore, PgInventoryStore};
