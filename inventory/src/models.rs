// ============================================================================
// MERIDIAN COMMERCE - INVENTORY MODELS
// ============================================================================
// Module: inventory/src/models.rs
// Description: Inventory ledger entities, movement/transfer state machines,
//              cycle count sessions, audit log rows
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

use meridian_shared::{Error, Result};

// ============================================================================
// WAREHOUSES & STOCK LEVELS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
}

/// Per-(warehouse, sku) stock row. Never hard-deleted.
///
/// `reserved_quantity <= quantity` holds at all times; "available" is the
/// derived difference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub warehouse_id: Uuid,
    pub sku: String,
    pub quantity: i64,
    pub reserved_quantity: i64,
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    pub fn new(organization_id: Uuid, warehouse_id: Uuid, sku: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_id,
            warehouse_id,
            sku: sku.to_string(),
            quantity: 0,
            reserved_quantity: 0,
            is_locked: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn available(&self) -> i64 {
        self.quantity - self.reserved_quantity
    }

    /// Apply an executed movement to the row, refusing any mutation that
    /// would break `0 <= reserved_quantity <= quantity`.
    pub fn apply_movement(&mut self, direction: MovementDirection, quantity: i64) -> Result<()> {
        match direction {
            MovementDirection::Inbound => {
                self.quantity += quantity;
            }
            MovementDirection::Outbound => {
                if quantity > self.available() {
                    return Err(Error::InsufficientStock {
                        sku: self.sku.clone(),
                        requested: quantity,
                        available: self.available(),
                    });
                }
                self.quantity -= quantity;
            }
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Absolute (set) write used by adjustments and cycle counts.
    pub fn set_quantity(&mut self, new_quantity: i64) -> Result<i64> {
        if new_quantity < 0 {
            return Err(Error::validation("quantity", "cannot be negative"));
        }
        if new_quantity < self.reserved_quantity {
            return Err(Error::validation(
                "quantity",
                format!(
                    "cannot drop below reserved quantity {}",
                    self.reserved_quantity
                ),
            ));
        }
        let previous = self.quantity;
        self.quantity = new_quantity;
        self.updated_at = Utc::now();
        Ok(previous)
    }

    /// Transfer execution moves only the reservation between rows; physical
    /// stock follows through the paired TRANSFER_OUT / TRANSFER_IN movements.
    pub fn release_reserved(&mut self, quantity: i64) {
        self.reserved_quantity = (self.reserved_quantity - quantity).max(0);
        self.updated_at = Utc::now();
    }

    pub fn take_reserved(&mut self, quantity: i64) {
        self.reserved_quantity += quantity;
        self.updated_at = Utc::now();
    }
}

/// A promise of stock to an order. Immutable once released.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub order_id: Uuid,
    pub sku: String,
    pub warehouse_id: Uuid,
    pub quantity_reserved: i64,
    pub released_at: Option<DateTime<Utc>>,
}

impl Reservation {
    pub fn is_active(&self) -> bool {
        self.released_at.is_none()
    }
}

// ============================================================================
// STOCK MOVEMENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    Receive,
    Ship,
    Return,
    TransferOut,
    TransferIn,
    AdjustmentAdd,
    AdjustmentRemove,
    Damage,
}

impl MovementType {
    /// Direction is fully determined by the type.
    pub fn direction(&self) -> MovementDirection {
        match self {
            MovementType::Receive
            | MovementType::Return
            | MovementType::TransferIn
            | MovementType::AdjustmentAdd => MovementDirection::Inbound,
            MovementType::Ship
            | MovementType::TransferOut
            | MovementType::AdjustmentRemove
            | MovementType::Damage => MovementDirection::Outbound,
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MovementType::Receive => "RECEIVE",
            MovementType::Ship => "SHIP",
            MovementType::Return => "RETURN",
            MovementType::TransferOut => "TRANSFER_OUT",
            MovementType::TransferIn => "TRANSFER_IN",
            MovementType::AdjustmentAdd => "ADJUSTMENT_ADD",
            MovementType::AdjustmentRemove => "ADJUSTMENT_REMOVE",
            MovementType::Damage => "DAMAGE",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for MovementType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "RECEIVE" => Ok(MovementType::Receive),
            "SHIP" => Ok(MovementType::Ship),
            "RETURN" => Ok(MovementType::Return),
            "TRANSFER_OUT" => Ok(MovementType::TransferOut),
            "TRANSFER_IN" => Ok(MovementType::TransferIn),
            "ADJUSTMENT_ADD" => Ok(MovementType::AdjustmentAdd),
            "ADJUSTMENT_REMOVE" => Ok(MovementType::AdjustmentRemove),
            "DAMAGE" => Ok(MovementType::Damage),
            other => Err(Error::validation("type", format!("unknown movement type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementDirection {
    Inbound,
    Outbound,
}

impl fmt::Display for MovementDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MovementDirection::Inbound => f.write_str("inbound"),
            MovementDirection::Outbound => f.write_str("outbound"),
        }
    }
}

impl std::str::FromStr for MovementDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "inbound" => Ok(MovementDirection::Inbound),
            "outbound" => Ok(MovementDirection::Outbound),
            other => Err(Error::validation("direction", format!("unknown direction: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementStatus {
    Pending,
    Completed,
    Cancelled,
    Failed,
}

impl MovementStatus {
    /// COMPLETED and CANCELLED never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MovementStatus::Completed | MovementStatus::Cancelled)
    }
}

impl fmt::Display for MovementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MovementStatus::Pending => "PENDING",
            MovementStatus::Completed => "COMPLETED",
            MovementStatus::Cancelled => "CANCELLED",
            MovementStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for MovementStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(MovementStatus::Pending),
            "COMPLETED" => Ok(MovementStatus::Completed),
            "CANCELLED" => Ok(MovementStatus::Cancelled),
            "FAILED" => Ok(MovementStatus::Failed),
            other => Err(Error::validation("status", format!("unknown movement status: {other}"))),
        }
    }
}

/// An atomic, audited change to stock in a single warehouse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub warehouse_id: Uuid,
    pub sku: String,
    pub quantity: i64,
    pub movement_type: MovementType,
    pub direction: MovementDirection,
    pub status: MovementStatus,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub reason: String,
    pub cancellation_reason: Option<String>,
    pub linked_movement_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    pub executed_by: Option<Uuid>,
}

impl StockMovement {
    pub fn mark_completed(&mut self, executed_by: Uuid) -> Result<()> {
        if self.status != MovementStatus::Pending {
            return Err(Error::InvalidState(format!(
                "movement {} is {}, only PENDING movements can be executed",
                self.id, self.status
            )));
        }
        self.status = MovementStatus::Completed;
        self.executed_at = Some(Utc::now());
        self.executed_by = Some(executed_by);
        Ok(())
    }

    pub fn mark_cancelled(&mut self, reason: &str) -> Result<()> {
        if self.status != MovementStatus::Pending {
            return Err(Error::InvalidState(format!(
                "movement {} is {}, only PENDING movements can be cancelled",
                self.id, self.status
            )));
        }
        self.status = MovementStatus::Cancelled;
        self.cancellation_reason = Some(reason.to_string());
        Ok(())
    }
}

// ============================================================================
// TRANSFER REQUESTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferType {
    Immediate,
    Pending,
    Scheduled,
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferType::Immediate => "IMMEDIATE",
            TransferType::Pending => "PENDING",
            TransferType::Scheduled => "SCHEDULED",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for TransferType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "IMMEDIATE" => Ok(TransferType::Immediate),
            "PENDING" => Ok(TransferType::Pending),
            "SCHEDULED" => Ok(TransferType::Scheduled),
            other => Err(Error::validation("transfer_type", format!("unknown transfer type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    Pending,
    Approved,
    InTransit,
    Completed,
    Rejected,
    Cancelled,
    Failed,
}

impl TransferStatus {
    /// Active transfers block further transfers against the same reservation.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TransferStatus::Pending | TransferStatus::Approved | TransferStatus::InTransit
        )
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferStatus::Pending => "PENDING",
            TransferStatus::Approved => "APPROVED",
            TransferStatus::InTransit => "IN_TRANSIT",
            TransferStatus::Completed => "COMPLETED",
            TransferStatus::Rejected => "REJECTED",
            TransferStatus::Cancelled => "CANCELLED",
            TransferStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for TransferStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(TransferStatus::Pending),
            "APPROVED" => Ok(TransferStatus::Approved),
            "IN_TRANSIT" => Ok(TransferStatus::InTransit),
            "COMPLETED" => Ok(TransferStatus::Completed),
            "REJECTED" => Ok(TransferStatus::Rejected),
            "CANCELLED" => Ok(TransferStatus::Cancelled),
            "FAILED" => Ok(TransferStatus::Failed),
            other => Err(Error::validation("status", format!("unknown transfer status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl fmt::Display for TransferPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferPriority::Low => "LOW",
            TransferPriority::Normal => "NORMAL",
            TransferPriority::High => "HIGH",
            TransferPriority::Urgent => "URGENT",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for TransferPriority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "LOW" => Ok(TransferPriority::Low),
            "NORMAL" => Ok(TransferPriority::Normal),
            "HIGH" => Ok(TransferPriority::High),
            "URGENT" => Ok(TransferPriority::Urgent),
            other => Err(Error::validation("priority", format!("unknown priority: {other}"))),
        }
    }
}

/// A coordinated move of reserved stock between two warehouses of one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub reservation_id: Uuid,
    pub source_warehouse_id: Uuid,
    pub target_warehouse_id: Uuid,
    pub sku: String,
    pub quantity: i64,
    pub transfer_type: TransferType,
    pub status: TransferStatus,
    pub priority: TransferPriority,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub reason: String,
    pub requested_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub rejected_by: Option<Uuid>,
    pub rejection_reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TransferRequest {
    pub fn approve(&mut self, approved_by: Uuid) -> Result<()> {
        if self.status != TransferStatus::Pending {
            return Err(Error::InvalidState(format!(
                "transfer {} is {}, only PENDING transfers can be approved",
                self.id, self.status
            )));
        }
        self.status = TransferStatus::Approved;
        self.approved_by = Some(approved_by);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn reject(&mut self, rejected_by: Uuid, reason: &str) -> Result<()> {
        if self.status != TransferStatus::Pending {
            return Err(Error::InvalidState(format!(
                "transfer {} is {}, only PENDING transfers can be rejected",
                self.id, self.status
            )));
        }
        self.status = TransferStatus::Rejected;
        self.rejected_by = Some(rejected_by);
        self.rejection_reason = Some(reason.to_string());
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<()> {
        if !self.status.is_active() {
            return Err(Error::InvalidState(format!(
                "transfer {} is {} and cannot be cancelled",
                self.id, self.status
            )));
        }
        self.status = TransferStatus::Cancelled;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn reschedule(&mut self, scheduled_at: DateTime<Utc>) -> Result<()> {
        if self.status != TransferStatus::Pending {
            return Err(Error::InvalidState(format!(
                "transfer {} is {}, only PENDING transfers can be rescheduled",
                self.id, self.status
            )));
        }
        if scheduled_at <= Utc::now() {
            return Err(Error::validation("scheduled_at", "must be in the future"));
        }
        self.scheduled_at = Some(scheduled_at);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_completed(&mut self) -> Result<()> {
        if self.status != TransferStatus::Approved && self.status != TransferStatus::InTransit {
            return Err(Error::InvalidState(format!(
                "transfer {} is {}, only APPROVED transfers can be executed",
                self.id, self.status
            )));
        }
        self.status = TransferStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
        Ok(())
    }
}

// ============================================================================
// CYCLE COUNT SESSIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleCountType {
    Full,
    Partial,
}

impl fmt::Display for CycleCountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleCountType::Full => f.write_str("FULL"),
            CycleCountType::Partial => f.write_str("PARTIAL"),
        }
    }
}

impl std::str::FromStr for CycleCountType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "FULL" => Ok(CycleCountType::Full),
            "PARTIAL" => Ok(CycleCountType::Partial),
            other => Err(Error::validation("type", format!("unknown cycle count type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleCountStatus {
    InProgress,
    Completed,
}

impl fmt::Display for CycleCountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleCountStatus::InProgress => f.write_str("IN_PROGRESS"),
            CycleCountStatus::Completed => f.write_str("COMPLETED"),
        }
    }
}

impl std::str::FromStr for CycleCountStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "IN_PROGRESS" => Ok(CycleCountStatus::InProgress),
            "COMPLETED" => Ok(CycleCountStatus::Completed),
            other => Err(Error::validation("status", format!("unknown session status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleCount {
    pub sku: String,
    pub counted_quantity: i64,
}

/// A physical re-count session. Counts accumulate through submissions and are
/// applied as absolute updates on completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleCountSession {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub warehouse_id: Uuid,
    pub count_type: CycleCountType,
    pub is_blind: bool,
    pub lock_items: bool,
    pub status: CycleCountStatus,
    pub item_skus: Vec<String>,
    pub counts: Vec<CycleCount>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CycleCountSession {
    /// Merge submitted counts by SKU, last write wins.
    pub fn merge_counts(&mut self, incoming: Vec<CycleCount>) {
        for count in incoming {
            match self.counts.iter_mut().find(|c| c.sku == count.sku) {
                Some(existing) => existing.counted_quantity = count.counted_quantity,
                None => self.counts.push(count),
            }
        }
    }
}

// ============================================================================
// AUDIT LOG
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Receive,
    Ship,
    Return,
    TransferOut,
    TransferIn,
    AdjustmentAdd,
    AdjustmentRemove,
    Damage,
    Transfer,
    AbsoluteUpdate,
    DeltaUpdate,
}

impl From<MovementType> for AuditAction {
    fn from(movement_type: MovementType) -> Self {
        match movement_type {
            MovementType::Receive => AuditAction::Receive,
            MovementType::Ship => AuditAction::Ship,
            MovementType::Return => AuditAction::Return,
            MovementType::TransferOut => AuditAction::TransferOut,
            MovementType::TransferIn => AuditAction::TransferIn,
            MovementType::AdjustmentAdd => AuditAction::AdjustmentAdd,
            MovementType::AdjustmentRemove => AuditAction::AdjustmentRemove,
            MovementType::Damage => AuditAction::Damage,
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuditAction::Receive => "RECEIVE",
            AuditAction::Ship => "SHIP",
            AuditAction::Return => "RETURN",
            AuditAction::TransferOut => "TRANSFER_OUT",
            AuditAction::TransferIn => "TRANSFER_IN",
            AuditAction::AdjustmentAdd => "ADJUSTMENT_ADD",
            AuditAction::AdjustmentRemove => "ADJUSTMENT_REMOVE",
            AuditAction::Damage => "DAMAGE",
            AuditAction::Transfer => "TRANSFER",
            AuditAction::AbsoluteUpdate => "ABSOLUTE_UPDATE",
            AuditAction::DeltaUpdate => "DELTA_UPDATE",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for AuditAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "RECEIVE" => Ok(AuditAction::Receive),
            "SHIP" => Ok(AuditAction::Ship),
            "RETURN" => Ok(AuditAction::Return),
            "TRANSFER_OUT" => Ok(AuditAction::TransferOut),
            "TRANSFER_IN" => Ok(AuditAction::TransferIn),
            "ADJUSTMENT_ADD" => Ok(AuditAction::AdjustmentAdd),
            "ADJUSTMENT_REMOVE" => Ok(AuditAction::AdjustmentRemove),
            "DAMAGE" => Ok(AuditAction::Damage),
            "TRANSFER" => Ok(AuditAction::Transfer),
            "ABSOLUTE_UPDATE" => Ok(AuditAction::AbsoluteUpdate),
            "DELTA_UPDATE" => Ok(AuditAction::DeltaUpdate),
            other => Err(Error::validation("action", format!("unknown audit action: {other}"))),
        }
    }
}

/// Append-only record of a stock mutation. Writes are best-effort: a failure
/// here is logged but never rolls back the primary write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryAuditLog {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub warehouse_id: Uuid,
    pub user_id: Uuid,
    pub sku: String,
    pub action: AuditAction,
    pub previous_quantity: Option<i64>,
    pub new_quantity: Option<i64>,
    pub variance: Option<i64>,
    pub variance_percent: Option<f64>,
    pub reason_code: String,
    pub notes: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// VARIANCE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VarianceLevel {
    Ok,
    Warning,
    Error,
}

/// Variance thresholds in percent.
#[derive(Debug, Clone, Copy)]
pub struct VarianceThresholds {
    pub warning: f64,
    pub error: f64,
    /// Updates whose absolute variance percent exceeds this are returned
    /// unapplied with `requires_approval` set. The default of 100 means
    /// every update is auto-approved.
    pub auto_approve: f64,
}

impl Default for VarianceThresholds {
    fn default() -> Self {
        Self {
            warning: 10.0,
            error: 25.0,
            auto_approve: 100.0,
        }
    }
}

impl VarianceThresholds {
    pub fn level(&self, variance_percent: f64) -> VarianceLevel {
        let magnitude = variance_percent.abs();
        if magnitude < self.warning {
            VarianceLevel::Ok
        } else if magnitude < self.error {
            VarianceLevel::Warning
        } else {
            VarianceLevel::Error
        }
    }
}

/// `variance_percent = 100 * variance / max(previous, 1)`
pub fn variance_percent(previous: i64, new: i64) -> f64 {
    let variance = (new - previous) as f64;
    100.0 * variance / (previous.max(1) as f64)
}

// ============================================================================
// REQUEST / RESPONSE SHAPES
// ============================================================================

pub const MIN_MOVEMENT_QUANTITY: i64 = 1;
pub const MAX_MOVEMENT_QUANTITY: i64 = 10_000_000;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMovementRequest {
    pub warehouse_id: Uuid,
    #[validate(length(min = 1, max = 120))]
    pub sku: String,
    #[validate(range(min = 1, max = 10_000_000))]
    pub quantity: i64,
    #[serde(rename = "type", alias = "movementType")]
    pub movement_type: MovementType,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    /// TRANSFER_OUT only: the receiving warehouse for the paired movement.
    pub target_warehouse_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovementFilter {
    pub movement_type: Option<MovementType>,
    pub status: Option<MovementStatus>,
    pub warehouse_id: Option<Uuid>,
    pub sku: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MovementStats {
    pub total_count: i64,
    pub pending_count: i64,
    pub completed_count: i64,
    pub cancelled_count: i64,
    pub failed_count: i64,
    pub inbound_quantity: i64,
    pub outbound_quantity: i64,
}

/// A single ledger write: either an absolute (set) or a delta (adjustment).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockWrite {
    #[serde(rename_all = "camelCase")]
    Absolute { new_quantity: i64 },
    #[serde(rename_all = "camelCase")]
    Delta { change: i64 },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdateRequest {
    pub warehouse_id: Uuid,
    pub sku: String,
    #[serde(flatten)]
    pub write: StockWrite,
    pub reason_code: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockUpdateOutcome {
    pub warehouse_id: Uuid,
    pub sku: String,
    pub previous_quantity: i64,
    pub new_quantity: i64,
    pub variance: i64,
    pub variance_percent: f64,
    pub variance_level: VarianceLevel,
    pub requires_approval: bool,
    pub applied: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkUpdateItemResult {
    pub sku: String,
    pub outcome: Option<StockUpdateOutcome>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransferRequest {
    pub reservation_id: Uuid,
    pub source_warehouse_id: Uuid,
    pub target_warehouse_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i64,
    pub transfer_type: TransferType,
    pub priority: Option<TransferPriority>,
    pub scheduled_at: Option<DateTime<Utc>>,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCycleCountRequest {
    pub warehouse_id: Uuid,
    #[serde(rename = "type", alias = "countType")]
    pub count_type: CycleCountType,
    #[serde(default)]
    pub is_blind: bool,
    #[serde(default)]
    pub lock_items: bool,
    #[serde(default)]
    pub skus: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VarianceReportItem {
    pub sku: String,
    pub expected: i64,
    pub counted: i64,
    pub variance: i64,
    pub variance_percent: f64,
    pub variance_level: VarianceLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct VarianceReport {
    pub session_id: Uuid,
    pub total_items: usize,
    pub items_with_variance: usize,
    pub total_variance: i64,
    pub absolute_variance: i64,
    pub items: Vec<VarianceReportItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditFilter {
    pub warehouse_id: Option<Uuid>,
    pub sku: Option<String>,
    pub action: Option<AuditAction>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditStats {
    pub total_entries: i64,
    pub net_quantity_change: i64,
    pub entries_by_action: std::collections::HashMap<String, i64>,
}

/// Per-tenant notification fan-out toggles, consulted at emission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub organization_id: Uuid,
    pub notify_on_transfer_request: bool,
    pub notify_on_transfer_completion: bool,
}

impl NotificationConfig {
    pub fn default_for(organization_id: Uuid) -> Self {
        Self {
            organization_id,
            notify_on_transfer_request: true,
            notify_on_transfer_completion: true,
        }
    }
}
