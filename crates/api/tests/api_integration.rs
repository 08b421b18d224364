//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::AppState;
use api::auth::{Authenticator, TrustedHeaderAuthenticator};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use checkout::{InMemoryPaymentGateway, SessionStatus};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::{FoodItem, FoodItemId, InMemoryStore, Money, OrderStatus, RestaurantId};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    router: axum::Router,
    store: InMemoryStore,
    gateway: InMemoryPaymentGateway,
}

impl TestApp {
    async fn new() -> Self {
        let store = InMemoryStore::new();
        for (id, restaurant, name, cents) in [
            (5, 3, "Paneer Tikka", 950),
            (8, 3, "Mango Lassi", 500),
            (11, 4, "Masala Dosa", 1200),
        ] {
            store
                .insert_food_item(FoodItem {
                    id: FoodItemId::new(id),
                    restaurant_id: RestaurantId::new(restaurant),
                    name: name.to_string(),
                    unit_price: Money::from_cents(cents),
                    image_id: None,
                })
                .await;
        }
        let gateway = InMemoryPaymentGateway::new();
        let state = Arc::new(AppState::new(store.clone(), gateway.clone(), "inr"));
        let authenticator: Arc<dyn Authenticator> = Arc::new(TrustedHeaderAuthenticator);

        Self {
            router: api::create_app(state, authenticator, get_metrics_handle()),
            store,
            gateway,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn get_as(&self, user: i64, uri: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .uri(uri)
                .header("x-user-id", user.to_string())
                .header("x-user-email", format!("user{user}@example.com"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    async fn post_as(&self, user: i64, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .header("x-user-id", user.to_string())
                .header("x-user-email", format!("user{user}@example.com"))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn cart_id(&self, user: i64) -> i64 {
        let (status, json) = self.get_as(user, "/user/fetchcart").await;
        assert_eq!(status, StatusCode::OK);
        json["data"]["cart_id"].as_i64().unwrap()
    }

    async fn checkout(&self, user: i64, items: Value) -> (String, i64) {
        let (status, json) = self
            .post_as(
                user,
                "/payment/create-checkout-session",
                json!({ "items": items }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{json}");
        let secret = json["clientSecret"].as_str().unwrap();
        let session_id = secret.trim_end_matches("_secret").to_string();
        (session_id, json["orderId"].as_i64().unwrap())
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new().await;

    let (status, json) = app
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint_is_public() {
    let app = TestApp::new().await;

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_protected_routes_require_identity() {
    let app = TestApp::new().await;

    let (status, json) = app
        .send(
            Request::builder()
                .uri("/user/fetchcart")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["status"], "Error");
}

#[tokio::test]
async fn test_fetch_cart_creates_empty_cart_once() {
    let app = TestApp::new().await;

    let first = app.cart_id(42).await;
    let second = app.cart_id(42).await;
    assert_eq!(first, second);

    let (_, json) = app.get_as(42, "/user/fetchcart").await;
    assert_eq!(json["data"]["total_cents"], 0);
    assert!(json["data"]["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_sync_cart_scenario() {
    let app = TestApp::new().await;
    let cart_id = app.cart_id(42).await;
    let uri = format!("/user/synccart/{cart_id}");

    let (status, json) = app
        .post_as(
            42,
            &uri,
            json!({ "items": [{ "id": 5, "quantity": 2, "price": 9.50, "restrauntId": 3 }] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "Success");
    assert_eq!(json["message"], "Sync Successful");
    assert_eq!(json["data"]["total_cents"], 1900);
    assert_eq!(json["data"]["restaurant_id"], 3);

    let (status, json) = app
        .post_as(
            42,
            &uri,
            json!({ "items": [
                { "id": 5, "quantity": 1, "price": 9.50, "restrauntId": 3 },
                { "id": 8, "quantity": 1, "price": 5.00, "restrauntId": 3 }
            ] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["total_cents"], 1450);

    let (_, json) = app.get_as(42, "/user/fetchcart").await;
    assert_eq!(json["data"]["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_sync_cart_error_statuses() {
    let app = TestApp::new().await;
    let cart_id = app.cart_id(42).await;
    let uri = format!("/user/synccart/{cart_id}");

    let (status, json) = app
        .post_as(
            42,
            &uri,
            json!({ "items": [
                { "id": 5, "quantity": 1, "restrauntId": 3 },
                { "id": 11, "quantity": 1, "restrauntId": 4 }
            ] }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["status"], "Error");

    let (status, _) = app
        .post_as(42, &uri, json!({ "items": [{ "id": 5, "quantity": 0, "restrauntId": 3 }] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post_as(7, &uri, json!({ "items": [{ "id": 5, "quantity": 1, "restrauntId": 3 }] }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post_as(42, "/user/synccart/999", json!({ "items": [] }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post_as(42, "/user/synccart/abc", json!({ "items": [] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post_as(42, &uri, json!({ "wrong": true })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_checkout_and_complete_payment() {
    let app = TestApp::new().await;
    let cart_id = app.cart_id(42).await;

    let (session_id, order_id) = app
        .checkout(
            42,
            json!([{ "id": 5, "quantity": 2, "price": 9.50, "restrauntId": 3 }]),
        )
        .await;
    let order = app.store.order_by_session(&session_id).await.unwrap();
    assert_eq!(order.id.as_i64(), order_id);
    assert_eq!(order.status, OrderStatus::Pending);

    let status_uri = format!("/payment/session-status?session_id={session_id}");
    let (status, json) = app.get_as(42, &status_uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "pending");

    app.gateway
        .set_session_status(&session_id, SessionStatus::Complete, Some("pi_1"));
    let (status, json) = app.get_as(42, &status_uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "completed");
    assert_eq!(json["customer_email"], "user42@example.com");

    let cart = app
        .store
        .cart(store::CartId::new(cart_id))
        .await
        .unwrap();
    assert!(!cart.active);

    let (status, json) = app.get_as(42, "/user/fetchorders").await;
    assert_eq!(status, StatusCode::OK);
    let orders = json["data"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["status"], "completed");
    assert_eq!(orders[0]["total_cents"], 1900);
    assert_eq!(orders[0]["items"][0]["name"], "Paneer Tikka");
}

#[tokio::test]
async fn test_checkout_gateway_failure_is_bad_gateway() {
    let app = TestApp::new().await;
    app.gateway.set_fail_on_create(true);

    let (status, json) = app
        .post_as(
            42,
            "/payment/create-checkout-session",
            json!({ "items": [{ "id": 5, "quantity": 1, "restrauntId": 3 }] }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["status"], "Error");
    assert_eq!(app.store.order_count().await, 0);
}

#[tokio::test]
async fn test_checkout_rejects_empty_items() {
    let app = TestApp::new().await;

    let (status, _) = app
        .post_as(42, "/payment/create-checkout-session", json!({ "items": [] }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_session_status_validation_and_ownership() {
    let app = TestApp::new().await;
    let (session_id, _) = app
        .checkout(42, json!([{ "id": 8, "quantity": 1, "restrauntId": 3 }]))
        .await;

    let (status, _) = app.get_as(42, "/payment/session-status").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .get_as(7, &format!("/payment/session-status?session_id={session_id}"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.gateway
        .set_session_status(&session_id, SessionStatus::Expired, None);
    let (status, json) = app
        .get_as(42, &format!("/payment/session-status?session_id={session_id}"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "expired");
}

#[tokio::test]
async fn test_session_status_for_unknown_session_is_not_found() {
    let app = TestApp::new().await;
    // A gateway lookup would surface as 502.
    app.gateway.set_fail_on_get(true);

    let (status, json) = app
        .get_as(42, "/payment/session-status?session_id=cs_does_not_exist")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], "Error");

    let (status, _) = app
        .get_as(
            42,
            "/payment/session-status?session_id=..%2F..%2Fcustomers%2Fcus_1%3Fexpand%5B%5D%3Dsources",
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
