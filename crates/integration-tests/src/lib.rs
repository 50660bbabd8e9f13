//! Integration tests for Threadline.
//!
//! Every test starts the real storefront router on an ephemeral port, wired
//! to in-process fakes of the commerce REST API and the payment processor.
//! No database or Redis is needed: pending orders live in memory and the
//! catalog cache uses the in-process backend.
//!
//! ```bash
//! cargo test -p threadline-integration-tests
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::{
    Form, Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use secrecy::SecretString;
use serde_json::{Value, json};
use threadline_core::CurrencyCode;
use threadline_storefront::config::{
    CacheBackendKind, CacheConfig, CommerceConfig, PaymentsConfig, StorefrontConfig,
};
use threadline_storefront::state::AppState;
use tokio::net::TcpListener;

/// Origin the test storefront accepts.
pub const ALLOWED_ORIGIN: &str = "http://shop.test";

/// Webhook secret used by [`TestStorefront::with_webhook_secret`].
pub const WEBHOOK_SECRET: &str = "whsec-Kq8vT2mZpL9xR4nB";

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Listener has no address");
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Test server failed");
    });
    addr
}

// =============================================================================
// Fake commerce API
// =============================================================================

/// Recorded state of the fake commerce API.
#[derive(Debug, Default)]
pub struct CommerceState {
    pub products: Vec<Value>,
    pub variations: HashMap<i64, Vec<Value>>,
    pub categories: Vec<Value>,
    /// Order creations that fail with 500 before one succeeds.
    pub order_failures: usize,
    /// Every order body received, including failed ones.
    pub order_requests: Vec<Value>,
    /// Count of product reads per id.
    pub product_reads: HashMap<i64, usize>,
    /// Orders created successfully, keyed by id.
    pub orders: HashMap<i64, Value>,
    pub next_order_id: i64,
}

/// In-process stand-in for the commerce REST API.
#[derive(Clone, Default)]
pub struct FakeCommerce {
    state: Arc<Mutex<CommerceState>>,
}

impl FakeCommerce {
    /// Fake seeded with two simple products, one variable product and a
    /// category.
    #[must_use]
    pub fn seeded() -> Self {
        let fake = Self::default();
        {
            let mut state = fake.state();
            state.next_order_id = 1000;
            state.products = vec![
                json!({
                    "id": 1, "name": "Cotton Shirt", "type": "simple",
                    "price": "1500", "regular_price": "1500", "sale_price": "",
                    "stock_status": "instock",
                    "images": [{"src": "https://img.test/shirt.jpg"}],
                    "categories": [{"name": "Men"}]
                }),
                json!({
                    "id": 2, "name": "Silk Scarf", "type": "simple",
                    "price": "2000", "regular_price": "2000", "sale_price": "1500",
                    "stock_status": "instock",
                    "images": [],
                    "categories": [{"name": "Women"}]
                }),
                json!({
                    "id": 3, "name": "Linen Kurta", "type": "variable",
                    "price": "4000", "sale_price": "",
                    "stock_status": "instock",
                    "attributes": [
                        {"id": 1, "name": "Size", "slug": "pa_size", "visible": true,
                         "variation": true, "options": ["S", "M"]}
                    ],
                    "default_attributes": [{"name": "Size", "option": "M"}],
                    "variations": [31, 32]
                }),
            ];
            state.variations.insert(
                3,
                vec![
                    json!({"id": 31, "price": "4000", "sale_price": "", "stock_status": "instock",
                           "attributes": [{"name": "Size", "option": "S"}]}),
                    json!({"id": 32, "price": "4500", "sale_price": "3600", "stock_status": "outofstock",
                           "attributes": [{"name": "Size", "option": "M"}]}),
                ],
            );
            state.categories = vec![json!({
                "id": 9, "name": "Men", "slug": "men", "parent": 0,
                "description": "", "count": 1
            })];
        }
        fake
    }

    /// Lock the recorded state.
    ///
    /// # Panics
    ///
    /// Panics if a handler panicked while holding the lock.
    pub fn state(&self) -> MutexGuard<'_, CommerceState> {
        self.state.lock().expect("commerce state poisoned")
    }

    /// Fail the next `n` order creations.
    pub fn fail_orders(&self, n: usize) {
        self.state().order_failures = n;
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/products", get(list_products))
            .route("/products/categories", get(list_categories))
            .route("/products/{id}", get(get_product))
            .route("/products/{id}/variations", get(list_variations))
            .route("/orders", post(create_order))
            .route("/orders/{id}", get(get_order).put(update_order))
            .with_state(self.clone())
    }

    /// Start the fake and return its API base URL.
    pub async fn start(&self) -> String {
        let addr = serve(self.router()).await;
        format!("http://{addr}")
    }
}

async fn list_products(State(fake): State<FakeCommerce>) -> Response {
    let products = fake.state().products.clone();
    let total = products.len();
    (
        [("x-wp-total", total.to_string()), ("x-wp-totalpages", "1".to_string())],
        Json(products),
    )
        .into_response()
}

async fn get_product(State(fake): State<FakeCommerce>, Path(id): Path<i64>) -> Response {
    let mut state = fake.state();
    *state.product_reads.entry(id).or_default() += 1;
    match state.products.iter().find(|p| p["id"] == id) {
        Some(product) => Json(product.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"code": "woocommerce_rest_product_invalid_id", "message": "Invalid ID."})),
        )
            .into_response(),
    }
}

async fn list_variations(State(fake): State<FakeCommerce>, Path(id): Path<i64>) -> Json<Vec<Value>> {
    Json(fake.state().variations.get(&id).cloned().unwrap_or_default())
}

async fn list_categories(State(fake): State<FakeCommerce>) -> Json<Vec<Value>> {
    Json(fake.state().categories.clone())
}

async fn create_order(State(fake): State<FakeCommerce>, Json(body): Json<Value>) -> Response {
    let mut state = fake.state();
    state.order_requests.push(body);
    if state.order_failures > 0 {
        state.order_failures -= 1;
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"message": "Database unavailable"})),
        )
            .into_response();
    }
    state.next_order_id += 1;
    let id = state.next_order_id;
    let order = json!({
        "id": id,
        "number": id.to_string(),
        "status": "processing",
        "total": "3000.00"
    });
    state.orders.insert(id, order.clone());
    (StatusCode::CREATED, Json(order)).into_response()
}

fn order_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"code": "woocommerce_rest_shop_order_invalid_id", "message": "Invalid ID."})),
    )
        .into_response()
}

async fn get_order(State(fake): State<FakeCommerce>, Path(id): Path<i64>) -> Response {
    match fake.state().orders.get(&id) {
        Some(order) => Json(order.clone()).into_response(),
        None => order_not_found(),
    }
}

async fn update_order(
    State(fake): State<FakeCommerce>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = fake.state();
    let Some(order) = state.orders.get_mut(&id) else {
        return order_not_found();
    };
    if let Some(status) = body.get("status") {
        order["status"] = status.clone();
    }
    Json(order.clone()).into_response()
}

// =============================================================================
// Fake payment processor
// =============================================================================

/// Recorded state of the fake payment processor.
#[derive(Debug, Default)]
pub struct PaymentsState {
    /// Form bodies of created intents, in order.
    pub created: Vec<HashMap<String, String>>,
    /// `Idempotency-Key` header of each create call.
    pub idempotency_keys: Vec<Option<String>>,
    /// Status reported per intent id; unknown ids report `succeeded`.
    pub statuses: HashMap<String, String>,
    /// Reject intent creation with 402.
    pub decline_create: bool,
}

/// In-process stand-in for the payment processor's intent API.
#[derive(Clone, Default)]
pub struct FakePayments {
    state: Arc<Mutex<PaymentsState>>,
}

impl FakePayments {
    /// Lock the recorded state.
    ///
    /// # Panics
    ///
    /// Panics if a handler panicked while holding the lock.
    pub fn state(&self) -> MutexGuard<'_, PaymentsState> {
        self.state.lock().expect("payments state poisoned")
    }

    /// Report `status` for `intent_id` from now on.
    pub fn set_status(&self, intent_id: &str, status: &str) {
        self.state()
            .statuses
            .insert(intent_id.to_string(), status.to_string());
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/v1/payment_intents", post(create_intent))
            .route("/v1/payment_intents/{id}", get(retrieve_intent))
            .with_state(self.clone())
    }

    /// Start the fake and return its API base URL.
    pub async fn start(&self) -> String {
        let addr = serve(self.router()).await;
        format!("http://{addr}")
    }
}

async fn create_intent(
    State(fake): State<FakePayments>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let mut state = fake.state();
    if state.decline_create {
        return (
            StatusCode::PAYMENT_REQUIRED,
            Json(json!({"error": {"message": "Your card was declined."}})),
        )
            .into_response();
    }
    state.idempotency_keys.push(
        headers
            .get("idempotency-key")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
    );
    state.created.push(form);
    let id = format!("pi_test_{}", state.created.len());
    Json(json!({
        "id": id,
        "client_secret": format!("{id}_secret_abc"),
        "status": "requires_payment_method"
    }))
    .into_response()
}

async fn retrieve_intent(State(fake): State<FakePayments>, Path(id): Path<String>) -> Json<Value> {
    let status = fake
        .state()
        .statuses
        .get(&id)
        .cloned()
        .unwrap_or_else(|| "succeeded".to_string());
    Json(json!({"id": id, "status": status}))
}

// =============================================================================
// Storefront under test
// =============================================================================

/// A running storefront plus its fakes and a cookie-keeping client.
pub struct TestStorefront {
    pub base_url: String,
    pub client: reqwest::Client,
    pub commerce: FakeCommerce,
    pub payments: FakePayments,
    pub state: AppState,
}

impl TestStorefront {
    /// Start a storefront without a webhook secret.
    pub async fn start() -> Self {
        Self::start_with(None).await
    }

    /// Start a storefront that requires signed webhooks.
    pub async fn with_webhook_secret() -> Self {
        Self::start_with(Some(WEBHOOK_SECRET)).await
    }

    async fn start_with(webhook_secret: Option<&str>) -> Self {
        let commerce = FakeCommerce::seeded();
        let payments = FakePayments::default();
        let commerce_url = commerce.start().await;
        let payments_url = payments.start().await;

        let config = StorefrontConfig {
            host: [127, 0, 0, 1].into(),
            port: 0,
            base_url: "http://127.0.0.1".to_string(),
            database_url: None,
            currency: CurrencyCode::PKR,
            allowed_origins: vec![ALLOWED_ORIGIN.to_string()],
            commerce: CommerceConfig {
                api_url: commerce_url,
                consumer_key: Some("ck_test".to_string()),
                consumer_secret: Some(SecretString::from("cs_test")),
            },
            payments: PaymentsConfig {
                api_url: payments_url,
                secret_key: Some(SecretString::from("sk_test_123")),
                publishable_key: Some("pk_test_123".to_string()),
            },
            cache: CacheConfig {
                backend: CacheBackendKind::Memory,
                redis_url: None,
                ttl: Duration::from_secs(300),
            },
            webhook_secret: webhook_secret.map(SecretString::from),
            reconcile_interval: Duration::from_secs(3600),
            sentry_dsn: None,
            sentry_environment: None,
        };

        let state = AppState::from_config(config, None).await;
        let addr = serve(threadline_storefront::app(state.clone())).await;

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: format!("http://{addr}"),
            client,
            commerce,
            payments,
            state,
        }
    }

    /// Absolute URL for a path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GET a path and decode the JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the request fails or the body is not JSON.
    pub async fn get_json(&self, path: &str) -> (StatusCode, Value) {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("GET failed");
        decode(response).await
    }

    /// POST a JSON body and decode the JSON response.
    ///
    /// # Panics
    ///
    /// Panics if the request fails or the body is not JSON.
    pub async fn post_json(&self, path: &str, body: &Value) -> (StatusCode, Value) {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("POST failed");
        decode(response).await
    }
}

async fn decode(response: reqwest::Response) -> (StatusCode, Value) {
    let status = StatusCode::from_u16(response.status().as_u16()).expect("valid status");
    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    (status, body)
}

/// Customer details that pass shipping validation.
#[must_use]
pub fn customer() -> Value {
    json!({
        "firstName": "Ayesha",
        "lastName": "Khan",
        "email": "ayesha@example.com",
        "phone": "+92 300 1234567",
        "address": "12 Mall Road",
        "city": "Lahore",
        "postalCode": "54000",
        "country": ""
    })
}
