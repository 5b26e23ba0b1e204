// ============================================================================
// MERIDIAN COMMERCE - INVENTORY HTTP SURFACE
// ============================================================================
// Module: inventory/src/handlers/mod.rs
// Description: Router and shared state for the inventory API
// ============================================================================

pub mod audit;
pub mod cycle_counts;
pub mod movements;
pub mod transfers;

use axum::routing::{get, post};
use axum::Router;

use crate::services::{
    AuditLogger, CycleCountService, MovementService, StockUpdateService, TransferService,
};

#[derive(Clone)]
pub struct InventoryState {
    pub movements: MovementService,
    pub transfers: TransferService,
    pub updates: StockUpdateService,
    pub cycle_counts: CycleCountService,
    pub audit: AuditLogger,
}

pub fn inventory_routes() -> Router<InventoryState> {
    Router::new()
        .route(
            "/movements",
            post(movements::create_movement).get(movements::list_movements),
        )
        .route("/movements/:id", get(movements::get_movement))
        .route("/movements/:id/execute", post(movements::execute_movement))
        .route("/movements/:id/cancel", post(movements::cancel_movement))
        .route("/updates", post(movements::apply_update))
        .route("/updates/bulk", post(movements::apply_bulk_update))
        .route("/transfers", post(transfers::create_transfer))
        .route("/transfers/:id/approve", post(transfers::approve_transfer))
        .route("/transfers/:id/reject", post(transfers::reject_transfer))
        .route("/transfers/:id/cancel", post(transfers::cancel_transfer))
        .route("/transfers/:id/complete", post(transfers::complete_transfer))
        .route(
            "/transfers/:id/reschedule",
            post(transfers::reschedule_transfer),
        )
        .route("/cycle-counts", post(cycle_counts::create_session))
        .route("/cycle-counts/:id/items", get(cycle_counts::session_items))
        .route("/cycle-counts/:id/counts", post(cycle_counts::submit_counts))
        .route("/cycle-counts/:id/complete", post(cycle_counts::complete_session))
        .route(
            "/cycle-counts/:id/variance-report",
            get(cycle_counts::variance_report),
        )
        .route("/audit", get(audit::list_audit))
}
