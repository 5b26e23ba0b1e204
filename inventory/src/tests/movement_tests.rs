use uuid::Uuid;

use meridian_shared::types::PageRequest;
use meridian_shared::Error;

use super::TestHarness;
use crate::models::{
    CreateMovementRequest, MovementFilter, MovementStatus, MovementType,
};

fn movement_request(
    warehouse_id: Uuid,
    sku: &str,
    quantity: i64,
    movement_type: MovementType,
) -> CreateMovementRequest {
    CreateMovementRequest {
        warehouse_id,
        sku: sku.to_string(),
        quantity,
        movement_type,
        reason: "test movement".to_string(),
        reference_type: None,
        reference_id: None,
        target_warehouse_id: None,
    }
}

#[tokio::test]
async fn receive_creates_pending_then_executes() {
    let h = TestHarness::new();
    let wh = h.seed_warehouse("Main");

    let movement = h
        .movements
        .create(&h.ctx, movement_request(wh, "SKU-001", 25, MovementType::Receive))
        .await
        .unwrap();
    assert_eq!(movement.status, MovementStatus::Pending);
    assert_eq!(movement.direction, crate::models::MovementDirection::Inbound);

    let (executed, stock) = h.movements.execute(&h.ctx, movement.id).await.unwrap();
    assert_eq!(executed.status, MovementStatus::Completed);
    assert!(executed.executed_at.is_some());
    assert_eq!(executed.executed_by, Some(h.ctx.user_id));
    assert_eq!(stock.quantity, 25);

    // Completion event followed the commit
    assert_eq!(h.publisher.event_types(), vec!["movement.completed"]);

    // Audit landed with before/after quantities
    let entries = h.store.audit_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].previous_quantity, Some(0));
    assert_eq!(entries[0].new_quantity, Some(25));
}

#[rstest::rstest]
#[case::zero(0)]
#[case::negative(-5)]
#[case::above_cap(10_000_001)]
#[tokio::test]
async fn quantity_bounds_are_enforced(#[case] quantity: i64) {
    let h = TestHarness::new();
    let wh = h.seed_warehouse("Main");

    let err = h
        .movements
        .create(&h.ctx, movement_request(wh, "SKU-001", quantity, MovementType::Receive))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }), "quantity {quantity}");
}

#[tokio::test]
async fn reason_is_sanitized_and_required() {
    let h = TestHarness::new();
    let wh = h.seed_warehouse("Main");

    let mut request = movement_request(wh, "SKU-001", 5, MovementType::Receive);
    request.reason = "<script>alert(1)</script>".to_string();
    let err = h.movements.create(&h.ctx, request).await.unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));

    let mut request = movement_request(wh, "SKU-001", 5, MovementType::Receive);
    request.reason = "<b>cycle</b> recount".to_string();
    let movement = h.movements.create(&h.ctx, request).await.unwrap();
    assert_eq!(movement.reason, "cycle recount");
}

#[tokio::test]
async fn unknown_warehouse_is_not_found() {
    let h = TestHarness::new();
    let err = h
        .movements
        .create(
            &h.ctx,
            movement_request(Uuid::new_v4(), "SKU-001", 5, MovementType::Receive),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn outbound_respects_reservations() {
    // Inventory fully reserved: SHIP of even one unit must be refused
    let h = TestHarness::new();
    let wh = h.seed_warehouse("Main");
    h.seed_stock(wh, "SKU-001", 50, 50);

    let err = h
        .movements
        .create(&h.ctx, movement_request(wh, "SKU-001", 1, MovementType::Ship))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InsufficientStock { available: 0, .. }));

    // RECEIVE of the same quantity is accepted and stays pending
    let movement = h
        .movements
        .create(&h.ctx, movement_request(wh, "SKU-001", 1, MovementType::Receive))
        .await
        .unwrap();
    assert_eq!(movement.status, MovementStatus::Pending);
}

#[tokio::test]
async fn outbound_boundary_exactly_available() {
    let h = TestHarness::new();
    let wh = h.seed_warehouse("Main");
    h.seed_stock(wh, "SKU-001", 30, 10);

    // available = 20: shipping exactly that much succeeds
    let ok = h
        .movements
        .create(&h.ctx, movement_request(wh, "SKU-001", 20, MovementType::Ship))
        .await
        .unwrap();
    let (_, stock) = h.movements.execute(&h.ctx, ok.id).await.unwrap();
    assert_eq!(stock.quantity, 10);
    assert_eq!(stock.reserved_quantity, 10);

    // one more unit fails
    let err = h
        .movements
        .create(&h.ctx, movement_request(wh, "SKU-001", 1, MovementType::Ship))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InsufficientStock { .. }));
}

#[tokio::test]
async fn cancel_requires_pending_and_reason() {
    let h = TestHarness::new();
    let wh = h.seed_warehouse("Main");

    let movement = h
        .movements
        .create(&h.ctx, movement_request(wh, "SKU-001", 5, MovementType::Receive))
        .await
        .unwrap();

    let err = h.movements.cancel(&h.ctx, movement.id, "  ").await.unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));

    let cancelled = h
        .movements
        .cancel(&h.ctx, movement.id, "ordered in error")
        .await
        .unwrap();
    assert_eq!(cancelled.status, MovementStatus::Cancelled);

    // Terminal: neither execute nor a second cancel may succeed
    assert!(matches!(
        h.movements.execute(&h.ctx, movement.id).await.unwrap_err(),
        Error::InvalidState(_)
    ));
    assert!(matches!(
        h.movements.cancel(&h.ctx, movement.id, "again").await.unwrap_err(),
        Error::InvalidState(_)
    ));
}

#[tokio::test]
async fn transfer_out_creates_linked_pair() {
    let h = TestHarness::new();
    let source = h.seed_warehouse("Source");
    let target = h.seed_warehouse("Target");
    h.seed_stock(source, "SKU-001", 40, 0);

    let mut request = movement_request(source, "SKU-001", 15, MovementType::TransferOut);
    request.target_warehouse_id = Some(target);

    let outbound = h.movements.create(&h.ctx, request).await.unwrap();
    assert_eq!(outbound.movement_type, MovementType::TransferOut);

    let inbound_id = outbound.linked_movement_id.expect("linked inbound");
    let inbound = h.movements.get(&h.ctx, inbound_id).await.unwrap();
    assert_eq!(inbound.movement_type, MovementType::TransferIn);
    assert_eq!(inbound.warehouse_id, target);
    assert_eq!(inbound.linked_movement_id, Some(outbound.id));
}

#[tokio::test]
async fn transfer_out_rejects_same_warehouse_and_missing_target() {
    let h = TestHarness::new();
    let source = h.seed_warehouse("Source");
    h.seed_stock(source, "SKU-001", 40, 0);

    let mut request = movement_request(source, "SKU-001", 5, MovementType::TransferOut);
    request.target_warehouse_id = Some(source);
    assert!(matches!(
        h.movements.create(&h.ctx, request).await.unwrap_err(),
        Error::Validation { .. }
    ));

    let request = movement_request(source, "SKU-001", 5, MovementType::TransferOut);
    assert!(matches!(
        h.movements.create(&h.ctx, request).await.unwrap_err(),
        Error::Validation { .. }
    ));
}

#[tokio::test]
async fn direct_transfer_in_is_rejected() {
    let h = TestHarness::new();
    let wh = h.seed_warehouse("Main");
    let err = h
        .movements
        .create(&h.ctx, movement_request(wh, "SKU-001", 5, MovementType::TransferIn))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
}

#[tokio::test]
async fn failed_execution_marks_movement_failed() {
    let h = TestHarness::new();
    let wh = h.seed_warehouse("Main");

    let movement = h
        .movements
        .create(&h.ctx, movement_request(wh, "SKU-001", 5, MovementType::Receive))
        .await
        .unwrap();

    h.store.fail_executions(true);
    let err = h.movements.execute(&h.ctx, movement.id).await.unwrap_err();
    assert!(matches!(err, Error::Database(_)));
    h.store.fail_executions(false);

    let after = h.movements.get(&h.ctx, movement.id).await.unwrap();
    assert_eq!(after.status, MovementStatus::Failed);
}

#[tokio::test]
async fn audit_failure_does_not_fail_execution() {
    let h = TestHarness::new();
    let wh = h.seed_warehouse("Main");
    let movement = h
        .movements
        .create(&h.ctx, movement_request(wh, "SKU-001", 5, MovementType::Receive))
        .await
        .unwrap();

    h.store.fail_audit_writes(true);
    let (executed, _) = h.movements.execute(&h.ctx, movement.id).await.unwrap();
    assert_eq!(executed.status, MovementStatus::Completed);
    assert!(h.store.audit_entries().is_empty());
}

#[tokio::test]
async fn movements_are_tenant_isolated() {
    let h = TestHarness::new();
    let other = TestHarness::new();
    let wh = h.seed_warehouse("Main");

    let movement = h
        .movements
        .create(&h.ctx, movement_request(wh, "SKU-001", 5, MovementType::Receive))
        .await
        .unwrap();

    // A different organization gets 404, not forbidden
    let err = other.movements.get(&other.ctx, movement.id).await;
    assert!(err.is_err());

    let cross_ctx = meridian_shared::types::RequestContext::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        meridian_shared::types::Role::Admin,
    );
    let err = h.movements.get(&cross_ctx, movement.id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn listing_filters_and_counts() {
    let h = TestHarness::new();
    let wh = h.seed_warehouse("Main");
    h.seed_stock(wh, "SKU-001", 100, 0);

    for _ in 0..3 {
        let m = h
            .movements
            .create(&h.ctx, movement_request(wh, "SKU-001", 10, MovementType::Receive))
            .await
            .unwrap();
        h.movements.execute(&h.ctx, m.id).await.unwrap();
    }
    let pending = h
        .movements
        .create(&h.ctx, movement_request(wh, "SKU-001", 4, MovementType::Ship))
        .await
        .unwrap();

    let (page, stats) = h
        .movements
        .list(&h.ctx, &MovementFilter::default(), &PageRequest::new(1, 10))
        .await
        .unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(stats.completed_count, 3);
    assert_eq!(stats.pending_count, 1);
    assert_eq!(stats.inbound_quantity, 30);
    assert_eq!(stats.outbound_quantity, 0);

    let filter = MovementFilter {
        status: Some(MovementStatus::Pending),
        ..Default::default()
    };
    let (page, _) = h
        .movements
        .list(&h.ctx, &filter, &PageRequest::new(1, 10))
        .await
        .unwrap();
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].id, pending.id);
}
