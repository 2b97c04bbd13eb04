//! Shared harness for sales-service integration tests.
//!
//! The router runs in-process over the in-memory stores, so these tests need
//! no MongoDB.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use sales_service::config::LedgerConfig;
use sales_service::services::store::{
    InMemoryCollectionStore, InMemoryDeadLetterStore, InMemoryLedgerStore, InMemoryRecordStore,
};
use sales_service::{build_router, AppState, Stores};
use serde_json::Value;
use std::sync::{Arc, Once};
use tower::util::ServiceExt;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("warn,sales_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn legacy_cutoff() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

pub fn ledger_config() -> LedgerConfig {
    LedgerConfig {
        legacy_cutoff: legacy_cutoff(),
        max_update_attempts: 5,
    }
}

/// Services over arbitrary stores, for tests that wrap the in-memory ones.
pub fn state_over(stores: Stores) -> AppState {
    AppState::new(stores, &ledger_config())
}

/// Drive `router` with one request as clerk-1.
pub async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("X-User-ID", "clerk-1");
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };

    TestResponse {
        status,
        headers,
        body,
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub records: Arc<InMemoryRecordStore>,
    pub ledger: Arc<InMemoryLedgerStore>,
    pub collections: Arc<InMemoryCollectionStore>,
    pub dead_letters: Arc<InMemoryDeadLetterStore>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub fn spawn() -> Self {
        init_tracing();

        let records = Arc::new(InMemoryRecordStore::new());
        let ledger = Arc::new(InMemoryLedgerStore::new());
        let collections = Arc::new(InMemoryCollectionStore::new());
        let dead_letters = Arc::new(InMemoryDeadLetterStore::new());

        let stores = Stores {
            records: records.clone(),
            ledger: ledger.clone(),
            collections: collections.clone(),
            dead_letters: dead_letters.clone(),
        };
        let state = state_over(stores);

        Self {
            router: build_router(state.clone()),
            state,
            records,
            ledger,
            collections,
            dead_letters,
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
        send(&self.router, method, uri, body).await
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, body: Option<Value>) -> TestResponse {
        self.request(Method::PATCH, uri, body).await
    }

    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.request(Method::DELETE, uri, None).await
    }

    /// Create a record and return its body.
    pub async fn create_record(&self, body: Value) -> Value {
        let response = self.post("/records", body).await;
        assert!(
            response.status.is_success(),
            "create failed: {} {}",
            response.status,
            response.body
        );
        response.body
    }

    pub async fn create_invoice(&self, number: &str, amount: &str) -> Value {
        self.create_record(serde_json::json!({
            "customerName": "Acme Ltd",
            "invoiceNumber": number,
            "facilitator": "Jo",
            "amount": amount,
            "date": "2024-03-10",
            "time": "09:15"
        }))
        .await
    }

    pub async fn sales_by_number(&self, number: &str) -> TestResponse {
        self.get(&format!("/sales/by-document/{}", number)).await
    }

    pub async fn pay(&self, number: &str, amount: &str) -> TestResponse {
        self.post(
            "/cash-collections",
            serde_json::json!({
                "customerName": "Acme Ltd",
                "documentNumber": number,
                "amountPaid": amount,
                "modeOfPayment": "cash"
            }),
        )
        .await
    }
}
