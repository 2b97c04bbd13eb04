pub mod collections;
pub mod health;
pub mod records;
pub mod sales;

pub use collections::{
    cancel_collection, create_collection, delete_collection, deposit_collection, get_collection,
    list_collections, update_collection, verify_collection,
};
pub use health::{health_check, metrics_endpoint, readiness_check};
pub use records::{
    create_record, delete_record, get_record, list_records, record_summary, update_record,
};
pub use sales::{
    get_sales_by_document, get_sales_entry, list_sales, resync_ledger, sales_summary,
    set_paid_amount, update_sales_entry,
};
