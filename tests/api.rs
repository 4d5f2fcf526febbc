//! End-to-end tests over the router, with the in-memory stores and a
//! capturing mailer standing in for Postgres and SMTP.

use std::sync::{Arc, Mutex};

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use clothier::auth::TokenSigner;
use clothier::domain::product::{Category, Product, Size};
use clothier::email::{DeliveryError, Email, Mailer};
use clothier::routes;
use clothier::store::memory::MemoryStore;
use clothier::AppState;

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
}

impl RecordingMailer {
    fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: Email) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

struct TestApp {
    router: Router,
    mailer: Arc<RecordingMailer>,
    tee: Product,
    shirt: Product,
}

fn product(name: &str, price: i64, category: Category, sizes: &[Size]) -> Product {
    Product {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: format!("{name} description"),
        price: Decimal::from(price),
        image_url: format!("https://img.example/{name}.jpg"),
        category,
        sizes: sizes.to_vec(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn test_app() -> TestApp {
    let tee = product("Crew Tee", 500, Category::Men, &[Size::S, Size::M]);
    let shirt = product("Oxford Shirt", 1200, Category::Men, &[Size::M, Size::L, Size::XL]);
    let store = Arc::new(MemoryStore::with_products(vec![tee.clone(), shirt.clone()]));
    let mailer = Arc::new(RecordingMailer::default());
    let state = AppState {
        products: store.clone(),
        carts: store.clone(),
        orders: store.clone(),
        users: store,
        mailer: mailer.clone(),
        tokens: Arc::new(TokenSigner::new("test-secret", 3600)),
        operator_email: Some("orders@clothier.test".to_string()),
    };
    TestApp {
        router: routes::router(state),
        mailer,
        tee,
        shirt,
    }
}

async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn register(router: &Router, name: &str, email: &str) -> String {
    let (status, body) = send(
        router,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "name": name, "email": email, "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn register_login_me_flow() {
    let app = test_app();
    let token = register(&app.router, "Ada", "ada@example.com").await;

    // Duplicate email rejected.
    let (status, body) = send(
        &app.router,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "name": "Ada", "email": "ada@example.com", "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email already in use");

    // Wrong password and unknown email look identical.
    for (email, password) in [("ada@example.com", "wrong"), ("nobody@example.com", "hunter22")] {
        let (status, body) = send(
            &app.router,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid email or password");
    }

    let (status, body) = send(
        &app.router,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "ada@example.com", "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Ada");

    let (status, body) = send(&app.router, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "ada@example.com");

    let (status, _) = send(&app.router, "GET", "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app.router, "GET", "/api/auth/me", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_validates_payload() {
    let app = test_app();
    let (status, _) = send(
        &app.router,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "name": "Ada", "email": "not-an-email", "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app.router,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "name": "Ada", "email": "ada@example.com", "password": "short" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn guest_adds_merge_by_product_and_size() {
    let app = test_app();
    let add = json!({
        "productId": app.tee.id,
        "size": "M",
        "quantity": 1,
        "guestId": "g-1"
    });
    let (status, body) = send(&app.router, "POST", "/api/cart/add", None, Some(add.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["quantity"], 1);

    let (_, body) = send(&app.router, "POST", "/api/cart/add", None, Some(add)).await;
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1, "same (product, size) must merge");
    assert_eq!(items[0]["quantity"], 2);
    assert_eq!(items[0]["product"]["name"], "Crew Tee");
    assert_eq!(body["guestId"], "g-1");

    // A different size is its own line.
    let (_, body) = send(
        &app.router,
        "POST",
        "/api/cart/add",
        None,
        Some(json!({ "productId": app.tee.id, "size": "S", "quantity": 1, "guestId": "g-1" })),
    )
    .await;
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn add_rejects_bad_input() {
    let app = test_app();

    // Size the product does not offer.
    let (status, body) = send(
        &app.router,
        "POST",
        "/api/cart/add",
        None,
        Some(json!({ "productId": app.tee.id, "size": "L", "quantity": 1, "guestId": "g-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid size for this product");

    let (status, _) = send(
        &app.router,
        "POST",
        "/api/cart/add",
        None,
        Some(json!({ "productId": app.tee.id, "size": "M", "quantity": 0, "guestId": "g-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app.router,
        "POST",
        "/api/cart/add",
        None,
        Some(json!({ "productId": Uuid::new_v4(), "size": "M", "quantity": 1, "guestId": "g-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Product not found");

    // Neither token nor guest id.
    let (status, body) = send(
        &app.router,
        "POST",
        "/api/cart/add",
        None,
        Some(json!({ "productId": app.tee.id, "size": "M", "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "guestId required for guest cart");
}

#[tokio::test]
async fn invalid_token_falls_back_to_guest_cart() {
    let app = test_app();
    let (status, body) = send(
        &app.router,
        "POST",
        "/api/cart/add",
        Some("not-a-valid-token"),
        Some(json!({ "productId": app.tee.id, "size": "M", "quantity": 1, "guestId": "g-9" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["guestId"], "g-9");
    assert!(body["user"].is_null());
}

#[tokio::test]
async fn update_overwrites_and_zero_deletes() {
    let app = test_app();
    let guest = json!({ "productId": app.tee.id, "size": "M", "quantity": 3, "guestId": "g-2" });
    send(&app.router, "POST", "/api/cart/add", None, Some(guest)).await;

    // Overwrite, not add.
    let (status, body) = send(
        &app.router,
        "PATCH",
        "/api/cart/item",
        None,
        Some(json!({ "productId": app.tee.id, "size": "M", "quantity": 5, "guestId": "g-2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"][0]["quantity"], 5);

    // Zero removes the line.
    let (status, body) = send(
        &app.router,
        "PATCH",
        "/api/cart/item",
        None,
        Some(json!({ "productId": app.tee.id, "size": "M", "quantity": 0, "guestId": "g-2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["items"].as_array().unwrap().is_empty());

    // Updating a line that is not there any more is a 404.
    let (status, body) = send(
        &app.router,
        "PATCH",
        "/api/cart/item",
        None,
        Some(json!({ "productId": app.tee.id, "size": "M", "quantity": 2, "guestId": "g-2" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Cart item not found");
}

#[tokio::test]
async fn remove_is_idempotent_over_http() {
    let app = test_app();
    send(
        &app.router,
        "POST",
        "/api/cart/add",
        None,
        Some(json!({ "productId": app.tee.id, "size": "M", "quantity": 2, "guestId": "g-3" })),
    )
    .await;

    let remove = json!({ "productId": app.tee.id, "size": "M", "guestId": "g-3" });
    let (status, body) = send(&app.router, "DELETE", "/api/cart/item", None, Some(remove.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["items"].as_array().unwrap().is_empty());

    let (status, body) = send(&app.router, "DELETE", "/api/cart/item", None, Some(remove)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn user_checkout_snapshots_totals_and_notifies() {
    let app = test_app();
    let token = register(&app.router, "Ada", "ada@example.com").await;

    for (product, qty) in [(&app.tee, 2), (&app.shirt, 1)] {
        let (status, _) = send(
            &app.router,
            "POST",
            "/api/cart/add",
            Some(&token),
            Some(json!({ "productId": product.id, "size": "M", "quantity": qty })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(
        &app.router,
        "POST",
        "/api/orders/checkout",
        Some(&token),
        Some(json!({ "address": "12 High St" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["message"], "Order placed successfully");
    let order = &body["order"];
    assert_eq!(order["totalPrice"].as_f64().unwrap(), 2200.0);
    assert_eq!(order["status"], "PLACED");
    assert_eq!(order["items"].as_array().unwrap().len(), 2);
    assert_eq!(order["items"][0]["price"].as_f64().unwrap(), 500.0);

    // Cart survives checkout, empty.
    let (status, body) = send(&app.router, "GET", "/api/cart", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["items"].as_array().unwrap().is_empty());

    // Customer confirmation plus operator alert.
    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].to, "ada@example.com");
    assert_eq!(sent[0].subject, "Your Order Confirmation");
    assert_eq!(sent[1].to, "orders@clothier.test");
    assert_eq!(sent[1].subject, "New Order Received");

    let (status, body) = send(&app.router, "GET", "/api/orders/my", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let orders = body.as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["totalPrice"].as_f64().unwrap(), 2200.0);
}

#[tokio::test]
async fn guest_checkout_requires_contact_email() {
    let app = test_app();
    send(
        &app.router,
        "POST",
        "/api/cart/add",
        None,
        Some(json!({ "productId": app.tee.id, "size": "M", "quantity": 1, "guestId": "g-4" })),
    )
    .await;

    let (status, body) = send(
        &app.router,
        "POST",
        "/api/orders/checkout",
        None,
        Some(json!({ "address": "12 High St", "guestId": "g-4" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Guest checkout requires guestId and a contact email."
    );
    // Nothing was placed or sent; the cart is untouched.
    assert!(app.mailer.sent().is_empty());
    let (_, body) = send(&app.router, "GET", "/api/cart/guest/g-4", None, None).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app.router,
        "POST",
        "/api/orders/checkout",
        None,
        Some(json!({ "address": "12 High St", "guestId": "g-4", "email": "guest@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["order"]["guestId"], "g-4");
    assert_eq!(app.mailer.sent()[0].to, "guest@example.com");
}

#[tokio::test]
async fn checkout_rejects_missing_address_and_empty_cart() {
    let app = test_app();
    send(
        &app.router,
        "POST",
        "/api/cart/add",
        None,
        Some(json!({ "productId": app.tee.id, "size": "M", "quantity": 1, "guestId": "g-5" })),
    )
    .await;

    let (status, body) = send(
        &app.router,
        "POST",
        "/api/orders/checkout",
        None,
        Some(json!({ "guestId": "g-5", "email": "g5@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Address is required");

    // Guest with no cart at all.
    let (status, body) = send(
        &app.router,
        "POST",
        "/api/orders/checkout",
        None,
        Some(json!({ "address": "12 High St", "guestId": "g-6", "email": "g6@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Cart is empty");
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn orders_listing_requires_valid_token() {
    let app = test_app();
    let (status, _) = send(&app.router, "GET", "/api/orders/my", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = send(&app.router, "GET", "/api/orders/my", Some("expired-junk"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Not authorized");
}

#[tokio::test]
async fn product_listing_filters_and_paginates() {
    let app = test_app();

    let (status, body) = send(&app.router, "GET", "/api/products?limit=1", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["products"].as_array().unwrap().len(), 1);
    assert_eq!(body["pagination"]["total"], 2);
    assert_eq!(body["pagination"]["totalPages"], 2);
    assert_eq!(body["pagination"]["limit"], 1);

    let (_, body) = send(&app.router, "GET", "/api/products?q=oxford", None, None).await;
    let products = body["products"].as_array().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["name"], "Oxford Shirt");

    let (_, body) = send(&app.router, "GET", "/api/products?size=S", None, None).await;
    assert_eq!(body["products"].as_array().unwrap().len(), 1);

    let (_, body) = send(
        &app.router,
        "GET",
        "/api/products?minPrice=600&maxPrice=2000",
        None,
        None,
    )
    .await;
    assert_eq!(body["products"][0]["name"], "Oxford Shirt");

    let (status, _) = send(&app.router, "GET", "/api/products?category=Shoes", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app.router, "GET", "/api/products?category=Women", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 0);
}

#[tokio::test]
async fn product_lookup() {
    let app = test_app();
    let (status, body) = send(
        &app.router,
        "GET",
        &format!("/api/products/{}", app.tee.id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Crew Tee");
    assert_eq!(body["sizes"], json!(["S", "M"]));

    let (status, body) = send(
        &app.router,
        "GET",
        &format!("/api/products/{}", Uuid::new_v4()),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Product not found");
}

#[tokio::test]
async fn guest_cart_read_creates_lazily() {
    let app = test_app();
    let (status, body) = send(&app.router, "GET", "/api/cart/guest/fresh-guest", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["guestId"], "fresh-guest");
    assert!(body["items"].as_array().unwrap().is_empty());

    // Same cart on the second read.
    let id = body["id"].as_str().unwrap().to_string();
    let (_, body) = send(&app.router, "GET", "/api/cart/guest/fresh-guest", None, None).await;
    assert_eq!(body["id"].as_str().unwrap(), id);
}
