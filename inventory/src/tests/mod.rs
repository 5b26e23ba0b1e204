mod movement_tests;
mod transfer_tests;
mod update_tests;

use std::sync::Arc;

use uuid::Uuid;

use meridian_shared::events::CapturingPublisher;
use meridian_shared::types::{RequestContext, Role};

use crate::models::{InventoryItem, Reservation, VarianceThresholds, Warehouse};
use crate::services::{
    CycleCountService, MovementPolicy, MovementService, StockUpdateService, TransferService,
};
use crate::store::MemoryInventoryStore;

pub struct TestHarness {
    pub store: Arc<MemoryInventoryStore>,
    pub publisher: Arc<CapturingPublisher>,
    pub movements: MovementService,
    pub transfers: TransferService,
    pub updates: StockUpdateService,
    pub cycle_counts: CycleCountService,
    pub ctx: RequestContext,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_role(Role::WarehouseManager)
    }

    pub fn with_role(role: Role) -> Self {
        let store = Arc::new(MemoryInventoryStore::new());
        let publisher = Arc::new(CapturingPublisher::new());
        let thresholds = VarianceThresholds::default();

        let movements = MovementService::new(
            store.clone(),
            publisher.clone(),
            MovementPolicy::default(),
        );
        let transfers = TransferService::new(store.clone(), publisher.clone());
        let updates = StockUpdateService::new(store.clone(), thresholds);
        let cycle_counts = CycleCountService::new(store.clone(), thresholds);

        let ctx = RequestContext::new(Uuid::new_v4(), Uuid::new_v4(), role);

        Self {
            store,
            publisher,
            movements,
            transfers,
            updates,
            cycle_counts,
            ctx,
        }
    }

    pub fn context_with_role(&self, role: Role) -> RequestContext {
        RequestContext::new(self.ctx.organization_id, Uuid::new_v4(), role)
    }

    pub fn seed_warehouse(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.store.seed_warehouse(Warehouse {
            id,
            organization_id: self.ctx.organization_id,
            name: name.to_string(),
        });
        id
    }

    pub fn seed_stock(&self, warehouse_id: Uuid, sku: &str, quantity: i64, reserved: i64) {
        let mut item = InventoryItem::new(self.ctx.organization_id, warehouse_id, sku);
        item.quantity = quantity;
        item.reserved_quantity = reserved;
        self.store.seed_item(item);
    }

    pub async fn quantity(&self, warehouse_id: Uuid, sku: &str) -> i64 {
        use crate::store::InventoryStore;
        self.store
            .get_item(self.ctx.organization_id, warehouse_id, sku)
            .await
            .unwrap()
            .map(|item| item.quantity)
            .unwrap_or(0)
    }

    pub fn seed_reservation(
        &self,
        warehouse_id: Uuid,
        sku: &str,
        quantity: i64,
    ) -> (Uuid, Uuid) {
        let reservation_id = Uuid::new_v4();
        let order_id = Uuid::new_v4();
        self.store.seed_reservation(Reservation {
            id: reservation_id,
            organization_id: self.ctx.organization_id,
            order_id,
            sku: sku.to_string(),
            warehouse_id,
            quantity_reserved: quantity,
            released_at: None,
        });
        (reservation_id, order_id)
    }
}
