//! # HTTP Cart Gateway
//!
//! `CartGateway` over the backend's REST API.
//!
//! ## Routes
//! ```text
//! ┌────────────────────────┬──────────────────────────────────────────────┐
//! │ get_cart               │ GET    cart                                  │
//! │ add_item               │ POST   cart/items                 (CartItem) │
//! │ update_item            │ PUT    cart/items/{itemId}       (ItemPatch) │
//! │ remove_item            │ DELETE cart/items/{itemId}                   │
//! │ add_add_on             │ POST   cart/items/{itemId}/addons    (AddOn) │
//! │ remove_add_on          │ DELETE cart/items/{itemId}/addons/{addOnId}  │
//! │ clear_cart             │ DELETE cart                                  │
//! │ validate_cart          │ POST   cart/validate                         │
//! │ get_cart_summary       │ GET    cart/summary                          │
//! │ get_available_add_ons  │ GET    addons/{itemType}/{itemId}            │
//! └────────────────────────┴──────────────────────────────────────────────┘
//! ```
//! Paths are relative to `gateway.base_url`; ids are percent-encoded as
//! single path segments.
//!
//! ## Error Classification
//! ```text
//! timeout               → SyncError::Timeout
//! connect / transport   → SyncError::Network
//! 409                   → SyncError::Conflict
//! 400, 422              → SyncError::ServerValidation
//! other non-2xx         → SyncError::Server { status, message }
//! undecodable body      → SyncError::Decode
//! ```

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use cartline_core::{AddOn, AvailableAddOn, Cart, CartItem, CartSummary, CartValidation, ItemPatch};

use crate::config::GatewaySettings;
use crate::error::{SyncError, SyncResult};
use crate::gateway::CartGateway;

// =============================================================================
// Gateway
// =============================================================================

/// REST implementation of [`CartGateway`].
#[derive(Debug, Clone)]
pub struct HttpCartGateway {
    client: Client,
    base_url: Url,
    request_timeout: Duration,
}

impl HttpCartGateway {
    pub fn new(settings: &GatewaySettings) -> SyncResult<Self> {
        let base_url = settings.parsed_base_url()?;
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout())
            .timeout(settings.request_timeout())
            .user_agent(settings.user_agent.as_str())
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("HTTP client: {e}")))?;

        debug!(base_url = %base_url, "HTTP cart gateway ready");
        Ok(Self::with_client(client, base_url, settings.request_timeout()))
    }

    /// Uses a caller-built client. `request_timeout` should match the
    /// client's own timeout; it is only used to label timeout errors.
    pub fn with_client(client: Client, base_url: Url, request_timeout: Duration) -> Self {
        HttpCartGateway {
            client,
            base_url,
            request_timeout,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // =========================================================================
    // Request Helpers
    // =========================================================================

    /// Appends percent-encoded segments to the base URL.
    fn url(&self, segments: &[&str]) -> SyncResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::InvalidUrl(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends the request and turns non-2xx answers into errors.
    async fn send(&self, request: RequestBuilder) -> SyncResult<Response> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        trace!(status = status.as_u16(), url = %response.url(), "Cart gateway response");

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let reason = status.canonical_reason().unwrap_or("unknown status");
        Err(classify_status(status.as_u16(), reason, &body))
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> SyncResult<T> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn transport_error(&self, err: reqwest::Error) -> SyncError {
        if err.is_timeout() {
            SyncError::Timeout(u64::try_from(self.request_timeout.as_millis()).unwrap_or(u64::MAX))
        } else if err.is_decode() {
            SyncError::Decode(err.to_string())
        } else {
            SyncError::Network(err.to_string())
        }
    }
}

/// Error payloads the backend is known to send.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    message: Option<String>,
}

fn classify_status(status: u16, reason: &str, body: &str) -> SyncError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .clone()
        .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
        .unwrap_or_else(|| reason.to_string());

    match status {
        409 => SyncError::Conflict(message),
        400 | 422 => {
            let errors = if parsed.errors.is_empty() {
                vec![message]
            } else {
                parsed.errors
            };
            SyncError::ServerValidation { errors }
        }
        _ => SyncError::Server { status, message },
    }
}

// =============================================================================
// CartGateway Implementation
// =============================================================================

#[async_trait]
impl CartGateway for HttpCartGateway {
    async fn get_cart(&self) -> SyncResult<Cart> {
        let url = self.url(&["cart"])?;
        self.json(self.client.get(url)).await
    }

    async fn add_item(&self, item: CartItem) -> SyncResult<Cart> {
        let url = self.url(&["cart", "items"])?;
        self.json(self.client.post(url).json(&item)).await
    }

    async fn update_item(&self, item_id: &str, patch: &ItemPatch) -> SyncResult<Cart> {
        let url = self.url(&["cart", "items", item_id])?;
        self.json(self.client.put(url).json(patch)).await
    }

    async fn remove_item(&self, item_id: &str) -> SyncResult<Cart> {
        let url = self.url(&["cart", "items", item_id])?;
        self.json(self.client.delete(url)).await
    }

    async fn add_add_on(&self, item_id: &str, add_on: &AddOn) -> SyncResult<Cart> {
        let url = self.url(&["cart", "items", item_id, "addons"])?;
        self.json(self.client.post(url).json(add_on)).await
    }

    async fn remove_add_on(&self, item_id: &str, add_on_id: &str) -> SyncResult<Cart> {
        let url = self.url(&["cart", "items", item_id, "addons", add_on_id])?;
        self.json(self.client.delete(url)).await
    }

    async fn clear_cart(&self) -> SyncResult<()> {
        let url = self.url(&["cart"])?;
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    async fn validate_cart(&self) -> SyncResult<CartValidation> {
        let url = self.url(&["cart", "validate"])?;
        self.json(self.client.post(url)).await
    }

    async fn get_cart_summary(&self) -> SyncResult<CartSummary> {
        let url = self.url(&["cart", "summary"])?;
        self.json(self.client.get(url)).await
    }

    async fn get_available_add_ons(
        &self,
        item_type: &str,
        item_id: &str,
    ) -> SyncResult<Vec<AvailableAddOn>> {
        let url = self.url(&["addons", item_type, item_id])?;
        self.json(self.client.get(url)).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::routing::{delete, get, post, put};
    use axum::{Json, Router};
    use cartline_core::{CartOp, CoreError, Money};
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    // -------------------------------------------------------------------------
    // Fake backend
    // -------------------------------------------------------------------------

    type Shared = Arc<Mutex<Cart>>;
    type Reply = Result<Json<Cart>, (StatusCode, Json<Value>)>;

    fn apply(state: &Shared, op: CartOp) -> Reply {
        let mut cart = state.lock().unwrap();
        match op.apply(&cart) {
            Ok(next) => {
                *cart = next;
                Ok(Json(cart.clone()))
            }
            Err(e @ CoreError::DuplicateItem(_)) | Err(e @ CoreError::DuplicateAddOn { .. }) => {
                Err((StatusCode::CONFLICT, Json(json!({ "message": e.to_string() }))))
            }
            Err(e @ CoreError::ItemNotFound(_)) => {
                Err((StatusCode::NOT_FOUND, Json(json!({ "message": e.to_string() }))))
            }
            Err(e) => Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "errors": [e.to_string()] })),
            )),
        }
    }

    fn backend(state: Shared) -> Router {
        Router::new()
            .route(
                "/api/cart",
                get(|State(s): State<Shared>| async move { Json(s.lock().unwrap().clone()) })
                    .delete(|State(s): State<Shared>| async move {
                        *s.lock().unwrap() = Cart::empty();
                        StatusCode::NO_CONTENT
                    }),
            )
            .route(
                "/api/cart/items",
                post(|State(s): State<Shared>, Json(item): Json<CartItem>| async move {
                    apply(&s, CartOp::AddItem(item))
                }),
            )
            .route(
                "/api/cart/items/{item_id}",
                put(
                    |State(s): State<Shared>,
                     Path(item_id): Path<String>,
                     Json(patch): Json<ItemPatch>| async move {
                        apply(&s, CartOp::UpdateItem { item_id, patch })
                    },
                )
                .delete(
                    |State(s): State<Shared>, Path(item_id): Path<String>| async move {
                        apply(&s, CartOp::RemoveItem { item_id })
                    },
                ),
            )
            .route(
                "/api/cart/items/{item_id}/addons",
                post(
                    |State(s): State<Shared>,
                     Path(item_id): Path<String>,
                     Json(add_on): Json<AddOn>| async move {
                        apply(&s, CartOp::AddAddOn { item_id, add_on })
                    },
                ),
            )
            .route(
                "/api/cart/items/{item_id}/addons/{add_on_id}",
                delete(
                    |State(s): State<Shared>,
                     Path((item_id, add_on_id)): Path<(String, String)>| async move {
                        apply(&s, CartOp::RemoveAddOn { item_id, add_on_id })
                    },
                ),
            )
            .route(
                "/api/cart/validate",
                post(|State(s): State<Shared>| async move {
                    let empty = s.lock().unwrap().is_empty();
                    Json(json!({
                        "valid": !empty,
                        "errors": if empty { vec!["Cart is empty"] } else { vec![] }
                    }))
                }),
            )
            .route(
                "/api/cart/summary",
                get(|State(s): State<Shared>| async move {
                    let cart = s.lock().unwrap().clone();
                    let subtotal = cart.total().cents();
                    Json(json!({
                        "itemCount": cart.item_count(),
                        "subtotal": subtotal,
                        "taxes": subtotal / 10,
                        "fees": 500,
                        "total": subtotal + subtotal / 10 + 500,
                        "currency": "USD"
                    }))
                }),
            )
            .route(
                "/api/addons/{item_type}/{item_id}",
                get(|Path((item_type, item_id)): Path<(String, String)>| async move {
                    Json(json!([{
                        "id": format!("{item_type}-meal"),
                        "name": format!("Meal for {item_id}"),
                        "price": 1500
                    }]))
                }),
            )
            .with_state(state)
    }

    async fn serve(app: Router) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn gateway_for(addr: SocketAddr) -> HttpCartGateway {
        let settings = GatewaySettings {
            base_url: format!("http://{addr}/api"),
            ..Default::default()
        };
        HttpCartGateway::new(&settings).unwrap()
    }

    async fn fake_backend() -> (HttpCartGateway, Shared) {
        let state: Shared = Arc::new(Mutex::new(Cart::empty()));
        let addr = serve(backend(Arc::clone(&state))).await;
        (gateway_for(addr), state)
    }

    /// A backend whose every cart route answers with `status` and `body`.
    async fn failing_backend(status: StatusCode, body: &'static str) -> HttpCartGateway {
        let app = Router::new().fallback(move || async move {
            (status, [("content-type", "application/json")], body)
        });
        gateway_for(serve(app).await)
    }

    // -------------------------------------------------------------------------
    // Route mapping
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_item_and_add_on_round_trip() {
        let (gateway, state) = fake_backend().await;

        let cart = gateway
            .add_item(CartItem::new("a", "flight", Money::from_cents(100)))
            .await
            .unwrap();
        assert_eq!(cart.total().cents(), 100);

        let cart = gateway
            .add_add_on("a", &AddOn::new("x", Money::from_cents(20)))
            .await
            .unwrap();
        assert_eq!(cart.total().cents(), 120);

        let cart = gateway
            .update_item("a", &ItemPatch::new().price(Money::from_cents(90)).set("seat", "3C"))
            .await
            .unwrap();
        assert_eq!(cart.total().cents(), 110);
        assert_eq!(cart.item("a").unwrap().attributes["seat"], "3C");

        let cart = gateway.remove_add_on("a", "x").await.unwrap();
        assert_eq!(cart.total().cents(), 90);

        let cart = gateway.remove_item("a").await.unwrap();
        assert!(cart.is_empty());
        assert_eq!(gateway.get_cart().await.unwrap(), *state.lock().unwrap());
    }

    #[tokio::test]
    async fn test_ids_are_percent_encoded() {
        let (gateway, state) = fake_backend().await;
        let id = "LH 400/FRA?JFK";

        gateway
            .add_item(CartItem::new(id, "flight", Money::from_cents(100)))
            .await
            .unwrap();
        assert_eq!(
            gateway.url(&["cart", "items", id]).unwrap().path(),
            "/api/cart/items/LH%20400%2FFRA%3FJFK"
        );

        let cart = gateway.remove_item(id).await.unwrap();
        assert!(cart.is_empty());
        assert!(state.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_validate_and_summary() {
        let (gateway, _state) = fake_backend().await;

        let validation = gateway.validate_cart().await.unwrap();
        assert!(!validation.valid);
        assert_eq!(validation.errors, ["Cart is empty"]);

        gateway
            .add_item(CartItem::new("a", "hotel", Money::from_cents(10_000)))
            .await
            .unwrap();
        assert!(gateway.validate_cart().await.unwrap().valid);

        let summary = gateway.get_cart_summary().await.unwrap();
        assert_eq!(summary.item_count, 1);
        assert_eq!(summary.taxes.cents(), 1_000);
        assert_eq!(summary.total.cents(), 11_500);
        assert_eq!(summary.currency, "USD");

        gateway.clear_cart().await.unwrap();
        assert!(gateway.get_cart().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_available_add_ons() {
        let (gateway, _state) = fake_backend().await;
        let add_ons = gateway.get_available_add_ons("flight", "a").await.unwrap();
        assert_eq!(add_ons.len(), 1);
        assert_eq!(add_ons[0].id, "flight-meal");
        assert_eq!(add_ons[0].name, "Meal for a");
        assert_eq!(add_ons[0].description, None);
        assert_eq!(add_ons[0].price.cents(), 1500);
    }

    // -------------------------------------------------------------------------
    // Error classification
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_duplicate_add_is_a_conflict() {
        let (gateway, _state) = fake_backend().await;
        let item = CartItem::new("a", "flight", Money::from_cents(100));
        gateway.add_item(item.clone()).await.unwrap();

        let err = gateway.add_item(item).await.unwrap_err();
        assert_eq!(err, SyncError::Conflict("Item already in cart: a".into()));
    }

    #[tokio::test]
    async fn test_validation_errors_are_relayed() {
        let gateway = failing_backend(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"errors":["date in the past","seat taken"]}"#,
        )
        .await;
        let err = gateway.get_cart().await.unwrap_err();
        assert_eq!(
            err,
            SyncError::ServerValidation {
                errors: vec!["date in the past".into(), "seat taken".into()]
            }
        );

        let gateway = failing_backend(StatusCode::BAD_REQUEST, r#"{"message":"bad patch"}"#).await;
        let err = gateway.update_item("a", &ItemPatch::new()).await.unwrap_err();
        assert_eq!(
            err,
            SyncError::ServerValidation {
                errors: vec!["bad patch".into()]
            }
        );
    }

    #[tokio::test]
    async fn test_server_errors_keep_status() {
        let gateway = failing_backend(StatusCode::SERVICE_UNAVAILABLE, "down for maintenance").await;
        let err = gateway.clear_cart().await.unwrap_err();
        assert_eq!(
            err,
            SyncError::Server {
                status: 503,
                message: "down for maintenance".into()
            }
        );
        assert!(err.is_retryable());

        let gateway = failing_backend(StatusCode::INTERNAL_SERVER_ERROR, "").await;
        let err = gateway.get_cart().await.unwrap_err();
        assert_eq!(
            err,
            SyncError::Server {
                status: 500,
                message: "Internal Server Error".into()
            }
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_a_decode_error() {
        let gateway = failing_backend(StatusCode::OK, r#"{"items": "nope"}"#).await;
        let err = gateway.get_cart().await.unwrap_err();
        assert!(matches!(err, SyncError::Decode(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = gateway_for(addr).get_cart().await.unwrap_err();
        assert!(matches!(err, SyncError::Network(_)), "got {err:?}");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_slow_backend_is_a_timeout() {
        let app = Router::new().route(
            "/api/cart",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(Cart::empty())
            }),
        );
        let addr = serve(app).await;

        let timeout = Duration::from_millis(100);
        let client = Client::builder().timeout(timeout).build().unwrap();
        let base = Url::parse(&format!("http://{addr}/api/")).unwrap();
        let gateway = HttpCartGateway::with_client(client, base, timeout);

        let err = gateway.get_cart().await.unwrap_err();
        assert_eq!(err, SyncError::Timeout(100));
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(
            classify_status(409, "Conflict", r#"{"message":"cart changed"}"#),
            SyncError::Conflict("cart changed".into())
        );
        assert_eq!(
            classify_status(422, "Unprocessable Entity", "plain text"),
            SyncError::ServerValidation {
                errors: vec!["plain text".into()]
            }
        );
        assert_eq!(
            classify_status(404, "Not Found", ""),
            SyncError::Server {
                status: 404,
                message: "Not Found".into()
            }
        );
    }
}
