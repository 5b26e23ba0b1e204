use uuid::Uuid;

use meridian_shared::Error;

use super::TestHarness;
use crate::models::{StockUpdateRequest, StockWrite, VarianceLevel};

fn absolute(warehouse_id: Uuid, sku: &str, new_quantity: i64) -> StockUpdateRequest {
    StockUpdateRequest {
        warehouse_id,
        sku: sku.to_string(),
        write: StockWrite::Absolute { new_quantity },
        reason_code: "RECOUNT".to_string(),
        notes: None,
    }
}

fn delta(warehouse_id: Uuid, sku: &str, change: i64) -> StockUpdateRequest {
    StockUpdateRequest {
        warehouse_id,
        sku: sku.to_string(),
        write: StockWrite::Delta { change },
        reason_code: "ADJUSTMENT".to_string(),
        notes: None,
    }
}

#[tokio::test]
async fn absolute_update_classifies_variance() {
    let h = TestHarness::new();
    let wh = h.seed_warehouse("Main");
    h.seed_stock(wh, "SKU-001", 100, 0);

    // 5% off: OK
    let outcome = h.updates.apply(&h.ctx, absolute(wh, "SKU-001", 105)).await.unwrap();
    assert!(outcome.applied);
    assert_eq!(outcome.previous_quantity, 100);
    assert_eq!(outcome.new_quantity, 105);
    assert_eq!(outcome.variance, 5);
    assert_eq!(outcome.variance_level, VarianceLevel::Ok);

    // 15% off the new 105: WARNING band
    let outcome = h.updates.apply(&h.ctx, absolute(wh, "SKU-001", 121)).await.unwrap();
    assert_eq!(outcome.variance_level, VarianceLevel::Warning);

    // Large shrink: ERROR band
    let outcome = h.updates.apply(&h.ctx, absolute(wh, "SKU-001", 60)).await.unwrap();
    assert_eq!(outcome.variance_level, VarianceLevel::Error);
}

#[tokio::test]
async fn above_auto_approve_threshold_is_withheld() {
    let h = TestHarness::new();
    let wh = h.seed_warehouse("Main");
    h.seed_stock(wh, "SKU-001", 100, 0);

    // +150% exceeds the default auto-approve threshold of 100
    let outcome = h.updates.apply(&h.ctx, absolute(wh, "SKU-001", 250)).await.unwrap();
    assert!(outcome.requires_approval);
    assert!(!outcome.applied);

    // The row is untouched and no audit entry was written
    assert_eq!(h.quantity(wh, "SKU-001").await, 100);
    assert!(h.store.audit_entries().is_empty());
}

#[tokio::test]
async fn delta_update_adjusts_and_audits() {
    let h = TestHarness::new();
    let wh = h.seed_warehouse("Main");
    h.seed_stock(wh, "SKU-001", 50, 10);

    let outcome = h.updates.apply(&h.ctx, delta(wh, "SKU-001", -5)).await.unwrap();
    assert_eq!(outcome.new_quantity, 45);

    let entries = h.store.audit_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, crate::models::AuditAction::DeltaUpdate);
    assert_eq!(entries[0].variance, Some(-5));

    // Cannot drop below the reserved quantity
    let err = h.updates.apply(&h.ctx, delta(wh, "SKU-001", -40)).await.unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
}

#[tokio::test]
async fn bulk_atomic_rolls_back_on_first_failure() {
    let h = TestHarness::new();
    let wh = h.seed_warehouse("Main");
    h.seed_stock(wh, "SKU-001", 50, 0);
    h.seed_stock(wh, "SKU-002", 50, 40);

    // Second write violates the reserved floor; the first must not land
    let err = h
        .updates
        .apply_bulk_atomic(
            &h.ctx,
            vec![absolute(wh, "SKU-001", 60), absolute(wh, "SKU-002", 10)],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));

    assert_eq!(h.quantity(wh, "SKU-001").await, 50);
    assert_eq!(h.quantity(wh, "SKU-002").await, 50);

    // A clean batch applies everything
    let outcomes = h
        .updates
        .apply_bulk_atomic(
            &h.ctx,
            vec![absolute(wh, "SKU-001", 60), absolute(wh, "SKU-002", 55)],
        )
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.applied));
}

#[tokio::test]
async fn bulk_best_effort_continues_past_failures() {
    let h = TestHarness::new();
    let wh = h.seed_warehouse("Main");
    h.seed_stock(wh, "SKU-001", 50, 0);
    h.seed_stock(wh, "SKU-002", 50, 40);

    let results = h
        .updates
        .apply_bulk_best_effort(
            &h.ctx,
            vec![
                absolute(wh, "SKU-001", 60),
                absolute(wh, "SKU-002", 10),
                absolute(wh, "SKU-001", 62),
            ],
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert!(results[0].outcome.is_some());
    assert!(results[1].error.is_some());
    assert!(results[2].outcome.is_some());

    assert_eq!(h.quantity(wh, "SKU-001").await, 62);
}

#[tokio::test]
async fn absolute_update_creates_missing_rows() {
    let h = TestHarness::new();
    let wh = h.seed_warehouse("Main");

    let outcome = h.updates.apply(&h.ctx, absolute(wh, "SKU-NEW", 12)).await.unwrap();
    assert_eq!(outcome.previous_quantity, 0);
    assert_eq!(outcome.new_quantity, 12);

    // Negative delta against a missing row is refused
    let err = h.updates.apply(&h.ctx, delta(wh, "SKU-GHOST", -3)).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}
