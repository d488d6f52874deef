//! Test helpers for store-service integration tests.
//!
//! Every test gets its own router over a fresh in-memory store seeded with
//! a small catalogue, driven through `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use std::sync::{Arc, Once};
use store_service::config::StoreConfig;
use store_service::models::{Customer, Employee, Product};
use store_service::services::MemoryStore;
use store_service::{build_router, AppState};
use tower::util::ServiceExt;

pub const EMPLOYEE_ID: &str = "NV01";
pub const CUSTOMER_ID: &str = "KH01";

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("error"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("Response body is not JSON")
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        init_tracing();

        let store = Arc::new(MemoryStore::new());
        seed(&store).await;

        let state = AppState::new(StoreConfig::in_memory(), store.clone())
            .expect("Failed to build application state");

        TestApp {
            router: build_router(state),
            store,
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body")
            .to_vec();

        TestResponse {
            status,
            headers,
            body,
        }
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

    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.request(Method::DELETE, uri, None).await
    }

    /// Creates an invoice for the default employee and returns its id.
    pub async fn create_invoice(&self, id: &str) -> String {
        let response = self
            .post(
                "/invoices",
                serde_json::json!({ "id": id, "employeeId": EMPLOYEE_ID, "date": "2024-06-10" }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.json());
        response.json()["id"].as_str().unwrap().to_string()
    }

    pub async fn add_line(&self, invoice_id: &str, product_id: &str, quantity: i32, price: f64) {
        let response = self
            .post(
                &format!("/invoices/{}/lines", invoice_id),
                serde_json::json!({
                    "productId": product_id,
                    "quantity": quantity,
                    "unitPrice": price
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.json());
    }

    pub async fn create_discount_code(&self, body: Value) -> Value {
        let response = self.post("/discount-codes", body).await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.json());
        response.json()
    }

    pub async fn add_product(&self, id: &str, name: &str, price: Decimal) {
        self.store.insert_product(product(id, name, price)).await;
    }
}

pub fn product(id: &str, name: &str, price: Decimal) -> Product {
    Product {
        id: id.to_string(),
        name: name.to_string(),
        unit: Some("Cái".to_string()),
        supplier_id: "NCC01".to_string(),
        cost_price: price * dec!(0.6),
        sell_price: price,
        quantity_on_hand: 100,
    }
}

async fn seed(store: &MemoryStore) {
    store
        .insert_employee(Employee {
            id: EMPLOYEE_ID.to_string(),
            name: "Nguyễn Văn A".to_string(),
            address: Some("Huế".to_string()),
            phone: Some("0123456789".to_string()),
        })
        .await;
    store
        .insert_customer(Customer {
            id: CUSTOMER_ID.to_string(),
            name: "Nguyễn Thị Lan".to_string(),
            category_id: "PL02".to_string(),
            address: Some("171 Bà Triệu, Huế".to_string()),
            phone: Some("0901234567".to_string()),
        })
        .await;
    store
        .insert_product(product("HH01", "Áo thun", dec!(250000)))
        .await;
    store
        .insert_product(product("HH02", "Quần jean", dec!(500000)))
        .await;
    store
        .insert_product(product("HH03", "Áo sơ mi", dec!(350000)))
        .await;
}
