use crate::config::{LedgerConfig, SalesConfig};
use crate::handlers;
use crate::services::store::{
    CollectionStore, DeadLetterStore, LedgerStore, MongoCollectionStore, MongoDeadLetterStore,
    MongoLedgerStore, MongoRecordStore, RecordStore,
};
use crate::services::{
    CashCollectionService, DeadLetterLog, DocumentLocks, MongoDb, RecordService, SalesLedger,
};
use axum::{
    middleware::from_fn,
    routing::{get, patch, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware, tracing::REQUEST_ID_HEADER,
};
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// The four persistence seams the services are built over.
#[derive(Clone)]
pub struct Stores {
    pub records: Arc<dyn RecordStore>,
    pub ledger: Arc<dyn LedgerStore>,
    pub collections: Arc<dyn CollectionStore>,
    pub dead_letters: Arc<dyn DeadLetterStore>,
}

impl Stores {
    pub fn mongo(db: &MongoDb) -> Self {
        Self {
            records: Arc::new(MongoRecordStore::new(db)),
            ledger: Arc::new(MongoLedgerStore::new(db)),
            collections: Arc::new(MongoCollectionStore::new(db)),
            dead_letters: Arc::new(MongoDeadLetterStore::new(db)),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub records: RecordService,
    pub ledger: SalesLedger,
    pub collections: CashCollectionService,
}

impl AppState {
    /// Wire the services. Ledger and collections share one lock table so
    /// record sync and payments on a document serialise against each other.
    pub fn new(stores: Stores, config: &LedgerConfig) -> Self {
        let locks = DocumentLocks::default();
        let ledger = SalesLedger::new(stores.ledger, locks, config.max_update_attempts);
        let dead_letters = DeadLetterLog::new(stores.dead_letters);
        let records = RecordService::new(
            stores.records,
            ledger.clone(),
            dead_letters,
            config.legacy_cutoff,
        );
        let collections = CashCollectionService::new(stores.collections, ledger.clone());

        Self {
            records,
            ledger,
            collections,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route(
            "/records",
            post(handlers::create_record).get(handlers::list_records),
        )
        .route("/records/summary", get(handlers::record_summary))
        .route(
            "/records/:id",
            get(handlers::get_record)
                .put(handlers::update_record)
                .delete(handlers::delete_record),
        )
        .route(
            "/cash-collections",
            post(handlers::create_collection).get(handlers::list_collections),
        )
        .route(
            "/cash-collections/:id",
            get(handlers::get_collection)
                .put(handlers::update_collection)
                .delete(handlers::delete_collection),
        )
        .route(
            "/cash-collections/:id/verify",
            patch(handlers::verify_collection),
        )
        .route(
            "/cash-collections/:id/deposit",
            patch(handlers::deposit_collection),
        )
        .route(
            "/cash-collections/:id/cancel",
            patch(handlers::cancel_collection),
        )
        .route("/sales", get(handlers::list_sales))
        .route("/sales/summary", get(handlers::sales_summary))
        .route("/sales/resync", post(handlers::resync_ledger))
        .route(
            "/sales/by-document/:document_number",
            get(handlers::get_sales_by_document),
        )
        .route(
            "/sales/:id",
            get(handlers::get_sales_entry).put(handlers::update_sales_entry),
        )
        .route("/sales/:id/payment", patch(handlers::set_paid_amount))
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    user_id = tracing::field::Empty,
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
}

pub struct Application {
    port: u16,
    server: Box<dyn Future<Output = std::io::Result<()>> + Send + Unpin>,
}

impl Application {
    pub async fn build(config: SalesConfig) -> Result<Self, AppError> {
        let db = MongoDb::connect(
            config.mongodb.uri.expose_secret(),
            &config.mongodb.database,
        )
        .await?;
        db.initialize_indexes().await.map_err(|e| {
            tracing::error!("Failed to initialize database indexes: {}", e);
            e
        })?;

        let state = AppState::new(Stores::mongo(&db), &config.ledger);
        let app = build_router(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            port,
            legacy_cutoff = %config.ledger.legacy_cutoff,
            "sales-service listening"
        );

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
