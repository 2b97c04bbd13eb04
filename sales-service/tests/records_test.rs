//! Record intake, normalization and ledger projection through the HTTP API.

mod common;

use axum::http::StatusCode;
use common::TestApp;
use mongodb::bson::Bson;
use sales_service::models::LegacyRecord;
use serde_json::json;

fn legacy(id: &str, invoice: &str, date: Option<Bson>) -> LegacyRecord {
    LegacyRecord {
        id: id.to_string(),
        version: None,
        customer_name: Some("Old Customer".into()),
        invoice_number: Some(invoice.into()),
        cash_sale_number: None,
        quotation_number: None,
        facilitator: Some("Sam".into()),
        amount: Some(Bson::Double(500.0)),
        created_by: Some("migrator".into()),
        date,
        time: Some("10:30".into()),
        created_at: None,
    }
}

#[tokio::test]
async fn create_returns_normalized_record() {
    let app = TestApp::spawn();

    let response = app
        .post(
            "/records",
            json!({
                "customerName": "  Acme Ltd ",
                "invoiceNumber": "INV-100",
                "facilitator": "Jo",
                "amount": 1000,
                "date": "2024-03-10",
                "time": "9:15 am"
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let body = response.body;
    assert_eq!(body["customerName"], "Acme Ltd");
    assert_eq!(body["documentType"], "invoice");
    assert_eq!(body["documentNumber"], "INV-100");
    assert_eq!(body["invoiceNumber"], "INV-100");
    assert!(body.get("cashSaleNumber").is_none());
    assert_eq!(body["amount"], "1000.00");
    assert_eq!(body["date"], "2024-03-10");
    assert_eq!(body["time"], "09:15:00");
    assert_eq!(body["dateUnparsed"], false);
    // Falls back to the X-User-ID header.
    assert_eq!(body["createdBy"], "clerk-1");
}

#[tokio::test]
async fn create_is_idempotent_on_document_number() {
    let app = TestApp::spawn();

    let first = app.create_invoice("INV-200", "1000").await;
    let second = app
        .post(
            "/records",
            json!({
                "customerName": "Someone Else",
                "invoiceNumber": "INV-200",
                "amount": 5
            }),
        )
        .await;

    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.body["id"], first["id"]);
    assert_eq!(second.body["amount"], "1000.00");
    assert_eq!(app.records.current_count(), 1);
    assert_eq!(app.ledger.len(), 1);
}

#[tokio::test]
async fn create_against_legacy_number_returns_legacy_record() {
    let app = TestApp::spawn();
    app.records
        .seed_legacy(legacy("legacy-1", "INV-OLD", Some(Bson::String("2023-05-04".into()))));

    let response = app
        .post(
            "/records",
            json!({ "customerName": "Acme", "invoiceNumber": "INV-OLD", "amount": 1 }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["id"], "legacy-1");
    assert_eq!(app.records.current_count(), 0);

    // The ledger learns about the legacy record on the idempotent path.
    let entry = app.sales_by_number("INV-OLD").await;
    assert_eq!(entry.status, StatusCode::OK);
    assert_eq!(entry.body["totalAmount"], "500.00");
}

#[tokio::test]
async fn create_requires_exactly_one_document_number() {
    let app = TestApp::spawn();

    let none = app
        .post("/records", json!({ "customerName": "Acme", "amount": 10 }))
        .await;
    assert_eq!(none.status, StatusCode::BAD_REQUEST);
    assert_eq!(none.body["code"], "validation_error");

    let two = app
        .post(
            "/records",
            json!({
                "customerName": "Acme",
                "invoiceNumber": "INV-1",
                "quotationNumber": "Q-1",
                "amount": 10
            }),
        )
        .await;
    assert_eq!(two.status, StatusCode::BAD_REQUEST);
    assert!(app.ledger.is_empty());
}

#[tokio::test]
async fn create_rejects_bad_input() {
    let app = TestApp::spawn();

    let empty_customer = app
        .post(
            "/records",
            json!({ "customerName": "", "invoiceNumber": "INV-1", "amount": 10 }),
        )
        .await;
    assert_eq!(empty_customer.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(empty_customer.body["code"], "validation_error");

    let negative = app
        .post(
            "/records",
            json!({ "customerName": "Acme", "invoiceNumber": "INV-2", "amount": -1 }),
        )
        .await;
    assert_eq!(negative.status, StatusCode::BAD_REQUEST);

    let bad_date = app
        .post(
            "/records",
            json!({
                "customerName": "Acme",
                "invoiceNumber": "INV-3",
                "amount": 10,
                "date": "next tuesday"
            }),
        )
        .await;
    assert_eq!(bad_date.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.records.current_count(), 0);
}

#[tokio::test]
async fn get_unknown_record_is_not_found() {
    let app = TestApp::spawn();

    let response = app.get("/records/does-not-exist").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["code"], "not_found");
}

#[tokio::test]
async fn list_merges_both_schemas_newest_first() {
    let app = TestApp::spawn();
    app.records
        .seed_legacy(legacy("legacy-1", "INV-L1", Some(Bson::String("2023-05-04".into()))));
    app.records
        .seed_legacy(legacy("legacy-2", "INV-L2", Some(Bson::String("sometime".into()))));
    app.create_invoice("INV-N1", "100").await;
    app.create_record(json!({
        "customerName": "Beta",
        "quotationNumber": "Q-1",
        "amount": 50,
        "date": "2024-04-01"
    }))
    .await;

    let response = app.get("/records").await;

    assert_eq!(response.status, StatusCode::OK);
    let numbers: Vec<&str> = response.body["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["documentNumber"].as_str().unwrap())
        .collect();
    assert_eq!(numbers, vec!["Q-1", "INV-N1", "INV-L1", "INV-L2"]);
    assert_eq!(response.body["total"], 4);
    assert_eq!(response.body["records"][3]["dateUnparsed"], true);
    assert_eq!(response.body["records"][2]["amount"], "500.00");
}

#[tokio::test]
async fn list_paginates_after_merging() {
    let app = TestApp::spawn();
    app.records
        .seed_legacy(legacy("legacy-1", "INV-L1", Some(Bson::String("2023-05-04".into()))));
    for day in 1..=4 {
        app.create_record(json!({
            "customerName": "Acme",
            "invoiceNumber": format!("INV-{}", day),
            "amount": 10,
            "date": format!("2024-02-0{}", day)
        }))
        .await;
    }

    let first = app.get("/records?page=1&limit=2").await;
    let last = app.get("/records?page=3&limit=2").await;

    assert_eq!(first.body["total"], 5);
    assert_eq!(first.body["hasMore"], true);
    assert_eq!(first.body["records"][0]["documentNumber"], "INV-4");
    assert_eq!(last.body["hasMore"], false);
    assert_eq!(last.body["records"].as_array().unwrap().len(), 1);
    assert_eq!(last.body["records"][0]["documentNumber"], "INV-L1");
}

#[tokio::test]
async fn list_filters_by_type_search_and_range() {
    let app = TestApp::spawn();
    app.records
        .seed_legacy(legacy("legacy-1", "INV-L1", Some(Bson::String("2024-06-01".into()))));
    app.create_invoice("INV-1", "100").await;
    app.create_record(json!({
        "customerName": "Beta Stores",
        "cashSaleNumber": "CS-1",
        "amount": 20,
        "date": "2024-05-20"
    }))
    .await;

    let cash_sales = app.get("/records?type=cashSale").await;
    assert_eq!(cash_sales.body["total"], 1);
    assert_eq!(cash_sales.body["records"][0]["documentNumber"], "CS-1");

    let search = app.get("/records?search=beta").await;
    assert_eq!(search.body["total"], 1);

    // Ranges starting after the cutoff never consult the legacy collection.
    let recent = app.get("/records?startDate=2024-05-01&endDate=2024-06-30").await;
    assert_eq!(recent.body["total"], 1);
    assert_eq!(recent.body["records"][0]["documentNumber"], "CS-1");

    let bad = app.get("/records?type=receipt").await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_propagates_to_ledger_and_keeps_payments() {
    let app = TestApp::spawn();
    let record = app.create_invoice("INV-300", "1000").await;
    assert_eq!(app.pay("INV-300", "400").await.status, StatusCode::CREATED);

    let response = app
        .put(
            &format!("/records/{}", record["id"].as_str().unwrap()),
            json!({ "amount": 1200, "customerName": "Acme Holdings" }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["amount"], "1200.00");
    // Time of day survives an amount-only edit.
    assert_eq!(response.body["time"], "09:15:00");

    let entry = app.sales_by_number("INV-300").await.body;
    assert_eq!(entry["customerName"], "Acme Holdings");
    assert_eq!(entry["totalAmount"], "1200.00");
    assert_eq!(entry["paidAmount"], "400.00");
    assert_eq!(entry["balanceDue"], "800.00");
    assert_eq!(entry["paymentStatus"], "partial");
}

#[tokio::test]
async fn update_rejects_document_number_change() {
    let app = TestApp::spawn();
    let record = app.create_invoice("INV-301", "10").await;
    let uri = format!("/records/{}", record["id"].as_str().unwrap());

    let changed = app.put(&uri, json!({ "invoiceNumber": "INV-999" })).await;
    assert_eq!(changed.status, StatusCode::BAD_REQUEST);

    let same = app
        .put(&uri, json!({ "invoiceNumber": "INV-301", "facilitator": "Kim" }))
        .await;
    assert_eq!(same.status, StatusCode::OK);
    assert_eq!(same.body["facilitator"], "Kim");
}

#[tokio::test]
async fn update_legacy_record_keeps_legacy_encoding() {
    let app = TestApp::spawn();
    app.records
        .seed_legacy(legacy("legacy-9", "INV-L9", Some(Bson::String("2023-05-04".into()))));

    let response = app
        .put("/records/legacy-9", json!({ "amount": "250.50", "date": "2023-06-01" }))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["date"], "2023-06-01");
    assert_eq!(response.body["time"], "10:30:00");

    let stored = app.records.legacy_snapshot("legacy-9").unwrap();
    assert_eq!(stored.amount, Some(Bson::Double(250.5)));
    assert_eq!(stored.date, Some(Bson::String("2023-06-01".into())));
    assert_eq!(app.records.current_count(), 0);
}

#[tokio::test]
async fn delete_removes_record_and_ledger_entry() {
    let app = TestApp::spawn();
    let record = app.create_invoice("INV-400", "1000").await;
    let uri = format!("/records/{}", record["id"].as_str().unwrap());

    let deleted = app.delete(&uri).await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.body["documentNumber"], "INV-400");

    assert_eq!(app.get(&uri).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.sales_by_number("INV-400").await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.delete(&uri).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn summary_counts_current_period() {
    let app = TestApp::spawn();
    // No date means "now".
    app.create_record(json!({ "customerName": "Acme", "invoiceNumber": "INV-T1", "amount": 100 }))
        .await;
    app.create_record(json!({ "customerName": "Acme", "cashSaleNumber": "CS-T1", "amount": "25.5" }))
        .await;
    app.create_record(json!({
        "customerName": "Acme",
        "quotationNumber": "Q-OLD",
        "amount": 999,
        "date": "2020-01-01"
    }))
    .await;

    let response = app.get("/records/summary").await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.body;
    assert_eq!(body["daily"]["all"]["count"], 2);
    assert_eq!(body["daily"]["all"]["total"], "125.50");
    assert_eq!(body["daily"]["cashSale"]["count"], 1);
    assert_eq!(body["yearly"]["quotation"]["count"], 0);
    assert_eq!(body["undatedRecords"], 0);
}
