//! Concurrent writers on the same invoice and on the same discount code.

mod common;

use axum::http::StatusCode;
use common::TestApp;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use store_service::services::Store;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_line_additions_keep_subtotal_exact() {
    let app = Arc::new(TestApp::spawn().await);
    let id = app.create_invoice("HD400").await;

    for n in 0..20 {
        app.add_product(&format!("SP{:02}", n), "Phụ kiện", Decimal::from(10000 * (n + 1)))
            .await;
    }

    let mut handles = Vec::new();
    for n in 0..20 {
        let app = app.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            let response = app
                .post(
                    &format!("/invoices/{}/lines", id),
                    json!({ "productId": format!("SP{:02}", n), "quantity": 2 }),
                )
                .await;
            response.status
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::CREATED);
    }

    // 2 * (10_000 + 20_000 + ... + 200_000)
    let expected = 2.0 * 10000.0 * (20.0 * 21.0 / 2.0);
    let invoice = app.store.get_invoice(&id).await.unwrap().unwrap();
    assert_eq!(invoice.subtotal, Decimal::from(4200000));
    let body = app.get(&format!("/invoices/{}", id)).await.json();
    assert_eq!(body["subtotal"].as_f64(), Some(expected));
    assert_eq!(body["rows"].as_array().unwrap().len(), 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_line_changes_with_discount_stay_consistent() {
    let app = Arc::new(TestApp::spawn().await);
    let id = app.create_invoice("HD401").await;
    app.create_discount_code(json!({ "code": "SALE10", "percentOff": 10 }))
        .await;
    app.put(&format!("/invoices/{}", id), json!({ "discountCode": "SALE10" }))
        .await;

    for n in 0..10 {
        app.add_product(&format!("SP{:02}", n), "Phụ kiện", Decimal::from(100000))
            .await;
    }

    let mut handles = Vec::new();
    for n in 0..10 {
        let app = app.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            let product = format!("SP{:02}", n);
            app.add_line(&id, &product, 1, 100000.0).await;
            if n % 2 == 0 {
                let response = app
                    .delete(&format!("/invoices/{}/lines/{}", id, product))
                    .await;
                assert_eq!(response.status, StatusCode::OK);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let invoice = app.store.get_invoice(&id).await.unwrap().unwrap();
    assert_eq!(invoice.subtotal, Decimal::from(500000));
    assert_eq!(invoice.discount_amount, Decimal::from(50000));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn limited_code_is_never_overdrawn() {
    let app = Arc::new(TestApp::spawn().await);
    app.create_discount_code(json!({ "code": "FLASH", "percentOff": 30, "usesLimit": 3 }))
        .await;

    let mut ids = Vec::new();
    for n in 0..10 {
        ids.push(app.create_invoice(&format!("HD41{}", n)).await);
    }

    let mut handles = Vec::new();
    for id in ids {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            app.put(&format!("/invoices/{}", id), json!({ "discountCode": "FLASH" }))
                .await
                .status
        }));
    }

    let mut attached = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::OK => attached += 1,
            StatusCode::BAD_REQUEST => rejected += 1,
            other => panic!("unexpected status {}", other),
        }
    }

    assert_eq!(attached, 3);
    assert_eq!(rejected, 7);
    let code = app.store.find_discount_code("FLASH").await.unwrap().unwrap();
    assert_eq!(code.uses_so_far, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn export_during_edits_sees_consistent_totals() {
    let app = Arc::new(TestApp::spawn().await);
    let id = app.create_invoice("HD420").await;
    for n in 0..10 {
        app.add_product(&format!("SP{:02}", n), "Phụ kiện", Decimal::from(50000))
            .await;
    }

    let writer = {
        let app = app.clone();
        let id = id.clone();
        tokio::spawn(async move {
            for n in 0..10 {
                app.add_line(&id, &format!("SP{:02}", n), 1, 50000.0).await;
            }
        })
    };

    for _ in 0..10 {
        let body = app.get(&format!("/invoices/{}", id)).await.json();
        let row_sum: f64 = body["rows"]
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["lineTotal"].as_f64().unwrap())
            .sum();
        assert_eq!(body["subtotal"].as_f64(), Some(row_sum));
    }

    writer.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_creates_with_one_id_consume_one_use() {
    let app = Arc::new(TestApp::spawn().await);
    app.create_discount_code(json!({ "code": "RACE", "percentOff": 5 }))
        .await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            app.post(
                "/invoices",
                json!({
                    "id": "HD950",
                    "employeeId": common::EMPLOYEE_ID,
                    "discountCode": "RACE"
                }),
            )
            .await
            .status
        }));
    }

    let mut created = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::CREATED => created += 1,
            StatusCode::CONFLICT => conflicts += 1,
            other => panic!("unexpected status {}", other),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(conflicts, 7);
    let code = app.store.find_discount_code("RACE").await.unwrap().unwrap();
    assert_eq!(code.uses_so_far, 1);
}
