// ============================================================================
// MERIDIAN COMMERCE - SCHEDULED TRANSFER WORKER
// ============================================================================
// Module: src/worker.rs
// Description: Background loop executing approved scheduled transfers when
//              their time arrives
// ============================================================================

use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use meridian_inventory::models::TransferStatus;
use meridian_inventory::services::TransferService;
use meridian_shared::types::{RequestContext, Role};

const POLL_INTERVAL: Duration = Duration::from_secs(60);

pub async fn run_scheduled_transfer_worker(transfers: TransferService) {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    info!("scheduled transfer worker started");

    loop {
        ticker.tick().await;

        let due = match transfers.due_scheduled(Utc::now()).await {
            Ok(due) => due,
            Err(e) => {
                warn!(error = %e, "failed to list due scheduled transfers");
                continue;
            }
        };

        for transfer in due {
            // Pending scheduled transfers still need a reviewer; only
            // approved ones are executed here
            if transfer.status != TransferStatus::Approved {
                continue;
            }

            let ctx = RequestContext::new(
                transfer.organization_id,
                transfer.requested_by,
                Role::Admin,
            );
            match transfers.execute(&ctx, transfer.id).await {
                Ok(_) => info!(transfer_id = %transfer.id, "scheduled transfer executed"),
                Err(e) => {
                    warn!(transfer_id = %transfer.id, error = %e, "scheduled transfer failed")
                }
            }
        }
    }
}
