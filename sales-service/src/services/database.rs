use crate::models::collection::COLLECTIONS_COLLECTION;
use crate::models::dead_letter::DEAD_LETTER_COLLECTION;
use crate::models::record::{LEGACY_COLLECTION, V2_COLLECTION};
use crate::models::sales::SALES_COLLECTION;
use crate::models::{CashCollection, LegacyRecord, SalesEntry, SyncDeadLetter, V2Record};
use mongodb::{
    bson::doc, options::IndexOptions, Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for sales-service");

        // A V2 document number can exist at most once per identifier field.
        // Partial filters let absent fields repeat.
        for field in ["invoiceNumber", "cashSaleNumber", "quotationNumber"] {
            let index = IndexModel::builder()
                .keys(doc! { field: 1 })
                .options(
                    IndexOptions::builder()
                        .name(format!("{}_unique", field))
                        .unique(true)
                        .partial_filter_expression(doc! { field: { "$type": "string" } })
                        .build(),
                )
                .build();
            self.records_v2()
                .create_index(index, None)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to create {} index on records_v2: {}", field, e);
                    AppError::from(e)
                })?;

            // Legacy lookups by number scan without this.
            let legacy_index = IndexModel::builder()
                .keys(doc! { field: 1 })
                .options(
                    IndexOptions::builder()
                        .name(format!("{}_lookup", field))
                        .build(),
                )
                .build();
            self.legacy_records()
                .create_index(legacy_index, None)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to create {} index on records: {}", field, e);
                    AppError::from(e)
                })?;
        }
        // Same number under two different fields would slip past the
        // per-field indexes.
        let any_number_index = IndexModel::builder()
            .keys(doc! { "documentNumber": 1 })
            .options(
                IndexOptions::builder()
                    .name("documentNumber_unique".to_string())
                    .unique(true)
                    .partial_filter_expression(doc! { "documentNumber": { "$type": "string" } })
                    .build(),
            )
            .build();
        self.records_v2()
            .create_index(any_number_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create documentNumber index on records_v2: {}", e);
                AppError::from(e)
            })?;
        tracing::info!("Created document number indexes on records and records_v2");

        let sales_number_index = IndexModel::builder()
            .keys(doc! { "documentNumber": 1 })
            .options(
                IndexOptions::builder()
                    .name("document_number_unique".to_string())
                    .unique(true)
                    .build(),
            )
            .build();
        self.sales()
            .create_index(sales_number_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create documentNumber index on sales: {}", e);
                AppError::from(e)
            })?;
        tracing::info!("Created unique index on sales.documentNumber");

        let collection_number_index = IndexModel::builder()
            .keys(doc! { "documentNumber": 1, "paymentDate": -1 })
            .options(
                IndexOptions::builder()
                    .name("document_number_lookup".to_string())
                    .build(),
            )
            .build();
        self.cash_collections()
            .create_index(collection_number_index, None)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to create documentNumber index on cash_collections: {}",
                    e
                );
                AppError::from(e)
            })?;
        tracing::info!("Created index on cash_collections.(documentNumber, paymentDate)");

        let pending_index = IndexModel::builder()
            .keys(doc! { "resolvedAt": 1, "occurredAt": 1 })
            .options(
                IndexOptions::builder()
                    .name("pending_lookup".to_string())
                    .build(),
            )
            .build();
        self.dead_letters()
            .create_index(pending_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create index on ledger_sync_dead_letters: {}", e);
                AppError::from(e)
            })?;
        tracing::info!("Created index on ledger_sync_dead_letters.(resolvedAt, occurredAt)");

        tracing::info!("All MongoDB indexes created successfully");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check ping failed: {}", e);
                AppError::from(e)
            })?;
        Ok(())
    }

    pub fn legacy_records(&self) -> Collection<LegacyRecord> {
        self.db.collection(LEGACY_COLLECTION)
    }

    pub fn records_v2(&self) -> Collection<V2Record> {
        self.db.collection(V2_COLLECTION)
    }

    pub fn sales(&self) -> Collection<SalesEntry> {
        self.db.collection(SALES_COLLECTION)
    }

    pub fn cash_collections(&self) -> Collection<CashCollection> {
        self.db.collection(COLLECTIONS_COLLECTION)
    }

    pub fn dead_letters(&self) -> Collection<SyncDeadLetter> {
        self.db.collection(DEAD_LETTER_COLLECTION)
    }
}
