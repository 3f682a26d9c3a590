use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ogen_schemas::{ProductInfo, RemoteOrder};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{DeleteOutcome, FulfillmentOrder, OrderPayload, RemoteError, RemoteOrderService};

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

const VARIANT_BY_SKU_QUERY: &str = r#"
query variantBySku($query: String!) {
  productVariants(first: 1, query: $query) {
    edges {
      node {
        id
        title
        price
        product { id title }
      }
    }
  }
}
"#;

/// REST admin API client.
///
/// The access token is passed in by the caller; never log it.
#[derive(Clone)]
pub struct AdminApiClient {
    token: String,
    http: reqwest::Client,
    base_url: String,
}

impl std::fmt::Debug for AdminApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminApiClient")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl AdminApiClient {
    pub fn new(
        shop_domain: &str,
        api_version: &str,
        token: String,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let base_url = format!(
            "https://{}/admin/api/{}",
            shop_domain.trim_end_matches('/'),
            api_version
        );
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Ok(Self {
            token,
            http,
            base_url,
        })
    }

    /// Point the client at an arbitrary base (tests use a mock server).
    pub fn new_with_base_url(token: String, base_url: String) -> Self {
        Self {
            token,
            http: reqwest::Client::new(),
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.url(path))
            .header(ACCESS_TOKEN_HEADER, &self.token)
    }
}

fn transport(e: reqwest::Error) -> RemoteError {
    RemoteError::Transport(e.to_string())
}

/// Numeric ids only; anything else cannot be placed in a REST path safely.
fn check_numeric_id(id: &str) -> Result<(), RemoteError> {
    if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(RemoteError::InvalidId(id.to_string()))
    }
}

/// `gid://shopify/ProductVariant/123` -> `123`. Plain ids pass through.
fn strip_gid(id: &str) -> String {
    id.rsplit('/').next().unwrap_or(id).to_string()
}

/// Ids arrive as JSON numbers on REST and strings on GraphQL.
fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Turn a non-2xx response into a [`RemoteError`], pulling a readable message
/// out of the `errors` field when the body has one.
async fn error_from_response(resp: Response) -> RemoteError {
    let status = resp.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.trim().parse::<f64>().ok())
            .map(|s| s.ceil() as u64);
        return RemoteError::RateLimited { retry_after_secs };
    }

    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("errors").cloned())
        .map(|e| match e {
            Value::String(s) => s,
            other => other.to_string(),
        })
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.canonical_reason().unwrap_or("unknown").to_string()
            } else {
                body
            }
        });
    RemoteError::Http {
        status: status.as_u16(),
        message,
    }
}

async fn decode<T: serde::de::DeserializeOwned>(resp: Response) -> Result<T, RemoteError> {
    resp.json::<T>()
        .await
        .map_err(|e| RemoteError::Decode(e.to_string()))
}

#[async_trait]
impl RemoteOrderService for AdminApiClient {
    fn name(&self) -> &'static str {
        "admin-api"
    }

    async fn create_order(&self, payload: &OrderPayload) -> Result<RemoteOrder, RemoteError> {
        let resp = self
            .request(reqwest::Method::POST, "/orders.json")
            .json(&json!({ "order": payload }))
            .send()
            .await
            .map_err(transport)?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        let body: OrderEnvelope = decode(resp).await?;
        body.order.into_remote_order()
    }

    async fn delete_order(&self, order_id: &str) -> Result<DeleteOutcome, RemoteError> {
        check_numeric_id(order_id)?;
        let resp = self
            .request(reqwest::Method::DELETE, &format!("/orders/{order_id}.json"))
            .send()
            .await
            .map_err(transport)?;
        match resp.status() {
            s if s.is_success() => Ok(DeleteOutcome::deleted()),
            StatusCode::NOT_FOUND => {
                tracing::debug!(order_id, "remote order already gone");
                Ok(DeleteOutcome::already_gone())
            }
            _ => Err(error_from_response(resp).await),
        }
    }

    async fn search_product_by_sku(&self, sku: &str) -> Result<Option<ProductInfo>, RemoteError> {
        let resp = self
            .request(reqwest::Method::POST, "/graphql.json")
            .json(&json!({
                "query": VARIANT_BY_SKU_QUERY,
                "variables": { "query": format!("sku:{sku}") },
            }))
            .send()
            .await
            .map_err(transport)?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        let body: GraphqlResponse = decode(resp).await?;
        if let Some(errors) = body.errors.filter(|e| !e.is_empty()) {
            let msg = errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(RemoteError::Api(msg));
        }

        let node = body
            .data
            .and_then(|d| d.product_variants)
            .and_then(|pv| pv.edges.into_iter().next())
            .map(|e| e.node);
        Ok(node.map(|n| ProductInfo {
            variant_id: strip_gid(&n.id),
            product_id: strip_gid(&n.product.id),
            title: if n.title.is_empty() || n.title == "Default Title" {
                n.product.title
            } else {
                format!("{} - {}", n.product.title, n.title)
            },
            price: n.price,
        }))
    }

    async fn get_fulfillment_orders(
        &self,
        order_id: &str,
    ) -> Result<Vec<FulfillmentOrder>, RemoteError> {
        check_numeric_id(order_id)?;
        let resp = self
            .request(
                reqwest::Method::GET,
                &format!("/orders/{order_id}/fulfillment_orders.json"),
            )
            .send()
            .await
            .map_err(transport)?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        let body: FulfillmentOrdersEnvelope = decode(resp).await?;
        body.fulfillment_orders
            .into_iter()
            .map(|fo| {
                Ok(FulfillmentOrder {
                    id: id_string(&fo.id)
                        .ok_or_else(|| RemoteError::Decode("fulfillment order id".into()))?,
                    assigned_location_id: fo.assigned_location_id.as_ref().and_then(id_string),
                    status: fo.status,
                })
            })
            .collect()
    }

    async fn move_fulfillment_order(
        &self,
        fulfillment_order_id: &str,
        location_id: &str,
    ) -> Result<(), RemoteError> {
        check_numeric_id(fulfillment_order_id)?;
        check_numeric_id(location_id)?;
        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/fulfillment_orders/{fulfillment_order_id}/move.json"),
            )
            .json(&json!({
                "fulfillment_order": { "new_location_id": location_id }
            }))
            .send()
            .await
            .map_err(transport)?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct OrderEnvelope {
    order: WireOrder,
}

#[derive(Debug, Deserialize)]
struct WireOrder {
    id: Value,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    order_number: Option<Value>,
    #[serde(default)]
    tags: String,
    #[serde(default)]
    total_price: String,
    #[serde(default)]
    financial_status: Option<String>,
    #[serde(default)]
    fulfillment_status: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl WireOrder {
    fn into_remote_order(self) -> Result<RemoteOrder, RemoteError> {
        let id = id_string(&self.id).ok_or_else(|| RemoteError::Decode("order id".into()))?;
        let order_number = self
            .name
            .or_else(|| self.order_number.as_ref().and_then(id_string).map(|n| format!("#{n}")))
            .unwrap_or_default();
        Ok(RemoteOrder {
            id,
            order_number,
            tags: self.tags,
            total_price: self.total_price,
            financial_status: self.financial_status,
            fulfillment_status: self.fulfillment_status,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Deserialize)]
struct FulfillmentOrdersEnvelope {
    #[serde(default)]
    fulfillment_orders: Vec<WireFulfillmentOrder>,
}

#[derive(Debug, Deserialize)]
struct WireFulfillmentOrder {
    id: Value,
    #[serde(default)]
    assigned_location_id: Option<Value>,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<GraphqlData>,
    errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphqlData {
    #[serde(rename = "productVariants")]
    product_variants: Option<VariantConnection>,
}

#[derive(Debug, Deserialize)]
struct VariantConnection {
    edges: Vec<VariantEdge>,
}

#[derive(Debug, Deserialize)]
struct VariantEdge {
    node: VariantNode,
}

#[derive(Debug, Deserialize)]
struct VariantNode {
    id: String,
    #[serde(default)]
    title: String,
    price: String,
    product: VariantProduct,
}

#[derive(Debug, Deserialize)]
struct VariantProduct {
    id: String,
    title: String,
}

// -----------------
// Tests (no network)
// -----------------
