//! CLOB REST API Client

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::debug;

use super::auth::ClobAuth;
use super::error::{ExchangeError, ExchangeResult};
use super::traits::Exchange;
use super::types::*;

/// Safety valve on cursor pagination
const MAX_ORDER_PAGES: usize = 20;

// ==================== REST CLIENT ====================

pub struct ClobRestClient {
    client: Client,
    clob_url: String,
    data_url: String,
    auth: ClobAuth,
}

impl ClobRestClient {
    pub fn new(endpoints: &ClobEndpoints, auth: ClobAuth, timeout: Duration) -> ExchangeResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(10)
            .tcp_nodelay(true)
            .build()?;
        Ok(Self {
            client,
            clob_url: endpoints.clob_url.trim_end_matches('/').to_string(),
            data_url: endpoints.data_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    /// Send an L2-authenticated request and return the status and raw body.
    /// The signature covers the path without its query string.
    async fn send_signed(
        &self,
        method: Method,
        path: &str,
        query: &str,
        body: Option<String>,
    ) -> ExchangeResult<(StatusCode, String)> {
        let start = Instant::now();
        let body = body.unwrap_or_default();
        let mut headers = self.auth.headers(method.as_str(), path, &body)?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let url = format!("{}{}{}", self.clob_url, path, query);
        debug!("[REST] {} {} | {}", method, url, body);

        let mut req = self.client.request(method, &url).headers(headers);
        if !body.is_empty() {
            req = req.body(body);
        }
        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        debug!("[REST] Response: {} in {:?} | {}", status, start.elapsed(), text);
        Ok((status, text))
    }

    async fn send_signed_json<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> ExchangeResult<(StatusCode, String)> {
        let body = serde_json::to_string(body)?;
        self.send_signed(method, path, "", Some(body)).await
    }
}

/// Map a non-success status to the transient kind; 4xx stays with the caller.
fn server_error(status: StatusCode, body: &str) -> ExchangeError {
    ExchangeError::Network(format!("{} - {}", status, body))
}

#[async_trait]
impl Exchange for ClobRestClient {
    fn name(&self) -> &str {
        "clob"
    }

    async fn get_midpoint(&self, token_id: &str) -> ExchangeResult<f64> {
        let url = format!("{}/midpoint?token_id={}", self.clob_url, urlencoding::encode(token_id));
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(if status.is_client_error() {
                ExchangeError::Malformed(format!("midpoint {} - {}", status, body))
            } else {
                server_error(status, &body)
            });
        }
        let parsed: MidpointResponse = serde_json::from_str(&resp.text().await?)?;
        parsed.midpoint()
    }

    async fn get_open_orders(&self, token_id: &str) -> ExchangeResult<Vec<OpenOrder>> {
        let mut orders = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_ORDER_PAGES {
            let mut query = format!("?asset_id={}", urlencoding::encode(token_id));
            if let Some(ref c) = cursor {
                query.push_str(&format!("&next_cursor={}", urlencoding::encode(c)));
            }
            let (status, body) = self.send_signed(Method::GET, "/data/orders", &query, None).await?;
            if !status.is_success() {
                return Err(server_error(status, &body));
            }

            let page: OrdersPage = serde_json::from_str(&body)?;
            for rec in page.data {
                orders.push(rec.into_order()?);
            }
            match page.next_cursor {
                Some(next) if !next.is_empty() && next != END_CURSOR => cursor = Some(next),
                _ => return Ok(orders),
            }
        }

        Err(ExchangeError::Malformed(format!(
            "open orders exceeded {} pages",
            MAX_ORDER_PAGES
        )))
    }

    async fn get_position(&self, market_address: &str) -> ExchangeResult<Position> {
        let url = format!(
            "{}/value?user={}&market={}",
            self.data_url,
            urlencoding::encode(self.auth.address()),
            urlencoding::encode(market_address)
        );
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ExchangeError::PositionQuery(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ExchangeError::PositionQuery(e.to_string()))?;
        if !status.is_success() {
            return Err(ExchangeError::PositionQuery(format!("{} - {}", status, body)));
        }

        let records: Vec<PositionValueRecord> = serde_json::from_str(&body)
            .map_err(|e| ExchangeError::PositionQuery(e.to_string()))?;
        PositionValueRecord::position(&records)
    }

    async fn create_and_submit_order(
        &self,
        token_id: &str,
        price: f64,
        size: f64,
        side: Side,
        time_in_force: TimeInForce,
    ) -> ExchangeResult<OrderId> {
        let req = PostOrderRequest {
            order: OrderArgs::limit(token_id, price, size, side),
            owner: self.auth.api_key().to_string(),
            order_type: time_in_force,
        };
        let (status, body) = self.send_signed_json(Method::POST, "/order", &req).await?;

        if status.is_client_error() {
            return Err(ExchangeError::OrderRejected(format!("{} - {}", status, body)));
        }
        if !status.is_success() {
            return Err(server_error(status, &body));
        }
        let parsed: PostOrderResponse = serde_json::from_str(&body)?;
        parsed.into_order_id()
    }

    async fn cancel_order(&self, order_id: &OrderId) -> ExchangeResult<()> {
        let req = CancelOrderRequest {
            order_id: order_id.0.clone(),
        };
        let (status, body) = self.send_signed_json(Method::DELETE, "/order", &req).await?;

        // Already-cancelled or filled orders come back as 4xx; nothing left to do.
        if status.is_success() || status.is_client_error() {
            return Ok(());
        }
        Err(server_error(status, &body))
    }

    async fn cancel_all_orders(&self, token_id: &str) -> ExchangeResult<()> {
        let req = CancelMarketRequest {
            asset_id: token_id.to_string(),
        };
        let (status, body) = self
            .send_signed_json(Method::DELETE, "/cancel-market-orders", &req)
            .await?;
        if status.is_success() {
            return Ok(());
        }
        Err(server_error(status, &body))
    }
}
