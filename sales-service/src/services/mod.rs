pub mod collections;
pub mod database;
pub mod dead_letter;
pub mod ledger;
pub mod locks;
pub mod metrics;
pub mod records;
pub mod store;
pub mod summary;

pub use collections::{CashCollectionService, CollectionInput};
pub use database::MongoDb;
pub use dead_letter::DeadLetterLog;
pub use ledger::SalesLedger;
pub use locks::{DocumentGuard, DocumentLocks};
pub use metrics::{get_metrics, init_metrics};
pub use records::{RecordInput, RecordService, RecordUpdate, ResyncReport};
pub use summary::{RecordSummary, SalesSummary};
