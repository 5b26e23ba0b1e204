pub mod audit;
pub mod cycle_counts;
pub mod movements;
pub mod transfers;
pub mod updates;

pub use audit::AuditLogger;
pub use cycle_counts::CycleCountService;
pub use movements::{MovementPolicy, MovementService};
pub use transfers::TransferService;
pub use updates::StockUpdateService;
