use chrono::{Duration, Utc};
use uuid::Uuid;

use meridian_shared::types::Role;
use meridian_shared::Error;

use super::TestHarness;
use crate::models::{
    CreateTransferRequest, NotificationConfig, TransferPriority, TransferStatus, TransferType,
};

fn transfer_request(
    reservation_id: Uuid,
    source: Uuid,
    target: Uuid,
    quantity: i64,
    transfer_type: TransferType,
) -> CreateTransferRequest {
    CreateTransferRequest {
        reservation_id,
        source_warehouse_id: source,
        target_warehouse_id: target,
        quantity,
        transfer_type,
        priority: None,
        scheduled_at: None,
        reason: "rebalance stock".to_string(),
        notes: None,
    }
}

/// Full PENDING lifecycle: request, approve, execute; stock, reservation,
/// audit and event ordering all line up.
#[tokio::test]
async fn pending_transfer_full_lifecycle() {
    let h = TestHarness::new();
    let wh_a = h.seed_warehouse("A");
    let wh_b = h.seed_warehouse("B");
    h.seed_stock(wh_a, "SKU-001", 100, 20);
    h.seed_stock(wh_b, "SKU-001", 50, 0);
    let (reservation_id, order_id) = h.seed_reservation(wh_a, "SKU-001", 20);

    let transfer = h
        .transfers
        .create(
            &h.ctx,
            transfer_request(reservation_id, wh_a, wh_b, 20, TransferType::Pending),
        )
        .await
        .unwrap();
    assert_eq!(transfer.status, TransferStatus::Pending);
    assert_eq!(transfer.sku, "SKU-001");

    let approved = h.transfers.approve(&h.ctx, transfer.id).await.unwrap();
    assert_eq!(approved.status, TransferStatus::Approved);
    assert_eq!(approved.approved_by, Some(h.ctx.user_id));

    let execution = h.transfers.execute(&h.ctx, transfer.id).await.unwrap();
    assert_eq!(execution.transfer.status, TransferStatus::Completed);
    assert_eq!(execution.source_item.reserved_quantity, 0);
    assert_eq!(execution.target_item.reserved_quantity, 20);

    // Only the reservation moved; physical stock changes go through the
    // TRANSFER_OUT / TRANSFER_IN movement pair, not the workflow engine
    assert_eq!(h.quantity(wh_a, "SKU-001").await, 100);
    assert_eq!(h.quantity(wh_b, "SKU-001").await, 50);

    // Reservation follows the stock; order linkage is untouched
    assert_eq!(execution.reservation.warehouse_id, wh_b);
    assert_eq!(execution.reservation.order_id, order_id);

    // Audit entry with transfer metadata
    let entries = h.store.audit_entries();
    let transfer_entry = entries
        .iter()
        .find(|e| e.action == crate::models::AuditAction::Transfer)
        .expect("transfer audit entry");
    assert_eq!(transfer_entry.sku, "SKU-001");
    assert_eq!(transfer_entry.metadata["quantity"], 20);
    assert_eq!(
        transfer_entry.metadata["reservation_id"],
        serde_json::json!(reservation_id)
    );

    // Events in lifecycle order (notification fan-out interleaves)
    let events = h.publisher.event_types();
    let lifecycle: Vec<&str> = events
        .iter()
        .map(String::as_str)
        .filter(|e| e.starts_with("transfer."))
        .collect();
    assert_eq!(
        lifecycle,
        vec!["transfer.requested", "transfer.approved", "transfer.completed"]
    );
}

/// IMMEDIATE transfers skip the pending step and auto-approve as the
/// requester; partial quantities leave the remainder reserved at the source.
#[tokio::test]
async fn immediate_transfer_auto_approves_partial() {
    let h = TestHarness::new();
    let wh_a = h.seed_warehouse("A");
    let wh_b = h.seed_warehouse("B");
    h.seed_stock(wh_a, "SKU-001", 100, 20);
    h.seed_stock(wh_b, "SKU-001", 50, 0);
    let (reservation_id, _) = h.seed_reservation(wh_a, "SKU-001", 20);

    let transfer = h
        .transfers
        .create(
            &h.ctx,
            transfer_request(reservation_id, wh_a, wh_b, 8, TransferType::Immediate),
        )
        .await
        .unwrap();
    assert_eq!(transfer.status, TransferStatus::Approved);
    assert_eq!(transfer.approved_by, Some(h.ctx.user_id));

    let execution = h.transfers.execute(&h.ctx, transfer.id).await.unwrap();
    assert_eq!(execution.source_item.reserved_quantity, 12);
    assert_eq!(execution.target_item.reserved_quantity, 8);

    // Physical quantities are untouched by the reservation move
    assert_eq!(h.quantity(wh_a, "SKU-001").await, 100);
    assert_eq!(h.quantity(wh_b, "SKU-001").await, 50);
}

#[tokio::test]
async fn create_validations() {
    let h = TestHarness::new();
    let wh_a = h.seed_warehouse("A");
    let wh_b = h.seed_warehouse("B");
    h.seed_stock(wh_a, "SKU-001", 100, 20);
    let (reservation_id, _) = h.seed_reservation(wh_a, "SKU-001", 20);

    // source = target
    let err = h
        .transfers
        .create(
            &h.ctx,
            transfer_request(reservation_id, wh_a, wh_a, 5, TransferType::Pending),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));

    // quantity above the reservation
    let err = h
        .transfers
        .create(
            &h.ctx,
            transfer_request(reservation_id, wh_a, wh_b, 21, TransferType::Pending),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));

    // unknown reservation
    let err = h
        .transfers
        .create(
            &h.ctx,
            transfer_request(Uuid::new_v4(), wh_a, wh_b, 5, TransferType::Pending),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    // source not matching the reservation's warehouse
    let err = h
        .transfers
        .create(
            &h.ctx,
            transfer_request(reservation_id, wh_b, wh_a, 5, TransferType::Pending),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));

    // unknown target warehouse
    let err = h
        .transfers
        .create(
            &h.ctx,
            transfer_request(reservation_id, wh_a, Uuid::new_v4(), 5, TransferType::Pending),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn one_active_transfer_per_reservation() {
    let h = TestHarness::new();
    let wh_a = h.seed_warehouse("A");
    let wh_b = h.seed_warehouse("B");
    h.seed_stock(wh_a, "SKU-001", 100, 20);
    let (reservation_id, _) = h.seed_reservation(wh_a, "SKU-001", 20);

    let first = h
        .transfers
        .create(
            &h.ctx,
            transfer_request(reservation_id, wh_a, wh_b, 5, TransferType::Pending),
        )
        .await
        .unwrap();

    let err = h
        .transfers
        .create(
            &h.ctx,
            transfer_request(reservation_id, wh_a, wh_b, 5, TransferType::Pending),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(_)));

    // Cancelling the first frees the reservation for a new request
    h.transfers.cancel(&h.ctx, first.id).await.unwrap();
    h.transfers
        .create(
            &h.ctx,
            transfer_request(reservation_id, wh_a, wh_b, 5, TransferType::Pending),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn scheduled_transfers_require_future_time() {
    let h = TestHarness::new();
    let wh_a = h.seed_warehouse("A");
    let wh_b = h.seed_warehouse("B");
    h.seed_stock(wh_a, "SKU-001", 100, 20);
    let (reservation_id, _) = h.seed_reservation(wh_a, "SKU-001", 20);

    let mut request = transfer_request(reservation_id, wh_a, wh_b, 5, TransferType::Scheduled);
    request.scheduled_at = Some(Utc::now() - Duration::minutes(1));
    assert!(matches!(
        h.transfers.create(&h.ctx, request).await.unwrap_err(),
        Error::Validation { .. }
    ));

    let mut request = transfer_request(reservation_id, wh_a, wh_b, 5, TransferType::Scheduled);
    request.scheduled_at = None;
    assert!(matches!(
        h.transfers.create(&h.ctx, request).await.unwrap_err(),
        Error::Validation { .. }
    ));

    let mut request = transfer_request(reservation_id, wh_a, wh_b, 5, TransferType::Scheduled);
    request.scheduled_at = Some(Utc::now() + Duration::hours(1));
    let transfer = h.transfers.create(&h.ctx, request).await.unwrap();
    assert_eq!(transfer.status, TransferStatus::Pending);
}

#[tokio::test]
async fn review_requires_privileged_role() {
    let h = TestHarness::new();
    let wh_a = h.seed_warehouse("A");
    let wh_b = h.seed_warehouse("B");
    h.seed_stock(wh_a, "SKU-001", 100, 20);
    let (reservation_id, _) = h.seed_reservation(wh_a, "SKU-001", 20);

    let transfer = h
        .transfers
        .create(
            &h.ctx,
            transfer_request(reservation_id, wh_a, wh_b, 5, TransferType::Pending),
        )
        .await
        .unwrap();

    let staff = h.context_with_role(Role::Staff);
    assert!(matches!(
        h.transfers.approve(&staff, transfer.id).await.unwrap_err(),
        Error::Forbidden(_)
    ));
    assert!(matches!(
        h.transfers.reject(&staff, transfer.id, "no").await.unwrap_err(),
        Error::Forbidden(_)
    ));

    let admin = h.context_with_role(Role::Admin);
    h.transfers.approve(&admin, transfer.id).await.unwrap();
}

#[tokio::test]
async fn reject_records_reviewer_and_reason() {
    let h = TestHarness::new();
    let wh_a = h.seed_warehouse("A");
    let wh_b = h.seed_warehouse("B");
    h.seed_stock(wh_a, "SKU-001", 100, 20);
    let (reservation_id, _) = h.seed_reservation(wh_a, "SKU-001", 20);

    let transfer = h
        .transfers
        .create(
            &h.ctx,
            transfer_request(reservation_id, wh_a, wh_b, 5, TransferType::Pending),
        )
        .await
        .unwrap();

    let rejected = h
        .transfers
        .reject(&h.ctx, transfer.id, "stock needed at source")
        .await
        .unwrap();
    assert_eq!(rejected.status, TransferStatus::Rejected);
    assert_eq!(rejected.rejected_by, Some(h.ctx.user_id));
    assert_eq!(
        rejected.rejection_reason.as_deref(),
        Some("stock needed at source")
    );

    // Rejected transfers are terminal for approval
    assert!(matches!(
        h.transfers.approve(&h.ctx, transfer.id).await.unwrap_err(),
        Error::InvalidState(_)
    ));
}

#[tokio::test]
async fn execute_requires_approval_first() {
    let h = TestHarness::new();
    let wh_a = h.seed_warehouse("A");
    let wh_b = h.seed_warehouse("B");
    h.seed_stock(wh_a, "SKU-001", 100, 20);
    let (reservation_id, _) = h.seed_reservation(wh_a, "SKU-001", 20);

    let transfer = h
        .transfers
        .create(
            &h.ctx,
            transfer_request(reservation_id, wh_a, wh_b, 5, TransferType::Pending),
        )
        .await
        .unwrap();

    let err = h.transfers.execute(&h.ctx, transfer.id).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));

    // Still PENDING, not FAILED: a state refusal is not a failed execution
    let after = h.transfers.get(&h.ctx, transfer.id).await.unwrap();
    assert_eq!(after.status, TransferStatus::Pending);
}

#[tokio::test]
async fn failed_execution_marks_transfer_failed() {
    let h = TestHarness::new();
    let wh_a = h.seed_warehouse("A");
    let wh_b = h.seed_warehouse("B");
    h.seed_stock(wh_a, "SKU-001", 100, 20);
    let (reservation_id, _) = h.seed_reservation(wh_a, "SKU-001", 20);

    let transfer = h
        .transfers
        .create(
            &h.ctx,
            transfer_request(reservation_id, wh_a, wh_b, 5, TransferType::Immediate),
        )
        .await
        .unwrap();

    h.store.fail_executions(true);
    let err = h.transfers.execute(&h.ctx, transfer.id).await.unwrap_err();
    assert!(matches!(err, Error::Database(_)));
    h.store.fail_executions(false);

    let after = h.transfers.get(&h.ctx, transfer.id).await.unwrap();
    assert_eq!(after.status, TransferStatus::Failed);
}

#[tokio::test]
async fn reschedule_updates_pending_only() {
    let h = TestHarness::new();
    let wh_a = h.seed_warehouse("A");
    let wh_b = h.seed_warehouse("B");
    h.seed_stock(wh_a, "SKU-001", 100, 20);
    let (reservation_id, _) = h.seed_reservation(wh_a, "SKU-001", 20);

    let mut request = transfer_request(reservation_id, wh_a, wh_b, 5, TransferType::Scheduled);
    request.scheduled_at = Some(Utc::now() + Duration::hours(1));
    let transfer = h.transfers.create(&h.ctx, request).await.unwrap();

    let new_time = Utc::now() + Duration::hours(6);
    let rescheduled = h
        .transfers
        .reschedule(&h.ctx, transfer.id, new_time)
        .await
        .unwrap();
    assert_eq!(rescheduled.status, TransferStatus::Pending);
    assert_eq!(rescheduled.scheduled_at, Some(new_time));

    assert!(matches!(
        h.transfers
            .reschedule(&h.ctx, transfer.id, Utc::now() - Duration::hours(1))
            .await
            .unwrap_err(),
        Error::Validation { .. }
    ));
}

#[tokio::test]
async fn due_scheduled_sorted_by_priority_then_time() {
    let h = TestHarness::new();
    let wh_a = h.seed_warehouse("A");
    let wh_b = h.seed_warehouse("B");
    h.seed_stock(wh_a, "SKU-001", 500, 100);

    let mut ids = Vec::new();
    for (priority, offset_mins) in [
        (TransferPriority::Normal, 30),
        (TransferPriority::Urgent, 10),
        (TransferPriority::Urgent, 5),
        (TransferPriority::Low, 1),
    ] {
        let (reservation_id, _) = h.seed_reservation(wh_a, "SKU-001", 25);
        let mut request = transfer_request(reservation_id, wh_a, wh_b, 5, TransferType::Scheduled);
        request.priority = Some(priority);
        request.scheduled_at = Some(Utc::now() + Duration::minutes(offset_mins));
        ids.push(h.transfers.create(&h.ctx, request).await.unwrap().id);
    }

    let due = h
        .transfers
        .due_scheduled(Utc::now() + Duration::hours(1))
        .await
        .unwrap();
    let due_ids: Vec<Uuid> = due.iter().map(|t| t.id).collect();
    // URGENT first (earlier scheduled_at breaking the tie), then NORMAL, then LOW
    assert_eq!(due_ids, vec![ids[2], ids[1], ids[0], ids[3]]);

    // Nothing due before any scheduled time
    let none = h.transfers.due_scheduled(Utc::now()).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn notification_fan_out_respects_tenant_config() {
    let h = TestHarness::new();
    let wh_a = h.seed_warehouse("A");
    let wh_b = h.seed_warehouse("B");
    h.seed_stock(wh_a, "SKU-001", 100, 20);
    let (reservation_id, _) = h.seed_reservation(wh_a, "SKU-001", 20);

    h.store.set_notification_config(NotificationConfig {
        organization_id: h.ctx.organization_id,
        notify_on_transfer_request: false,
        notify_on_transfer_completion: true,
    });

    let transfer = h
        .transfers
        .create(
            &h.ctx,
            transfer_request(reservation_id, wh_a, wh_b, 5, TransferType::Immediate),
        )
        .await
        .unwrap();
    h.transfers.execute(&h.ctx, transfer.id).await.unwrap();

    let events = h.publisher.event_types();
    assert!(!events.iter().any(|e| e == "notification.batch"));
    assert!(events.iter().any(|e| e == "notification.send"));
}
