pub mod database;
pub mod gateway;
pub mod inventory;
pub mod memory;
pub mod metrics;
pub mod placement;
pub mod pricing;
pub mod reconciliation;
pub mod store;

pub use database::PgStore;
pub use gateway::{MidtransClient, MockGateway, PaymentGateway};
pub use inventory::InventoryLedger;
pub use memory::MemoryStore;
pub use self::metrics::{get_metrics, init_metrics};
pub use placement::OrderPlacement;
pub use reconciliation::ReconciliationEngine;
pub use store::Store;
