use anyhow::Context;
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::api::{CandleSource, ExchangeTrading, OrderAck, OrderRequest, PositionRecord};
use crate::config::ExchangeConfig;
use crate::error::ExchangeError;
use crate::models::{Candle, Side, Symbol, Timeframe};

const CATEGORY: &str = "linear";
/// Bybit caps kline requests at 1000 rows
const MAX_KLINE_LIMIT: usize = 1000;

type HmacSha256 = Hmac<Sha256>;

// Type alias for the rate limiter to simplify signatures
type BybitRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Clone)]
struct Credentials {
    api_key: String,
    api_secret: String,
}

/// Bybit v5 REST client for linear perpetuals
///
/// Cloneable; all clones share the rate limiter and connection pool.
#[derive(Clone)]
pub struct BybitClient {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
    recv_window_ms: u64,
    timeout_secs: u64,
    rate_limiter: Arc<BybitRateLimiter>,
}

/// Envelope every v5 endpoint responds with
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    #[serde(default)]
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct KlineResult {
    list: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderCreateResult {
    order_id: String,
}

#[derive(Debug, Deserialize)]
struct PositionListResult {
    list: Vec<PositionEntry>,
}

#[derive(Debug, Deserialize)]
struct PositionEntry {
    symbol: String,
    #[serde(default)]
    side: String,
    size: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderCreateBody<'a> {
    category: &'a str,
    symbol: &'a str,
    side: String,
    order_type: &'a str,
    qty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trigger_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trigger_direction: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trigger_by: Option<&'a str>,
    reduce_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_link_id: Option<&'a str>,
}

/// Price or quantity as the decimal string the exchange expects
pub fn decimal_string(value: f64) -> Result<String, ExchangeError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ExchangeError::InvalidOrder(format!(
            "{} is not a valid price or quantity",
            value
        )));
    }
    Decimal::from_f64(value)
        .map(|d| d.round_dp(4).normalize().to_string())
        .ok_or_else(|| ExchangeError::InvalidOrder(format!("cannot encode {} as decimal", value)))
}

/// HMAC-SHA256 over `timestamp + api_key + recv_window + payload`, hex encoded
pub fn sign_payload(
    secret: &str,
    timestamp: i64,
    api_key: &str,
    recv_window_ms: u64,
    payload: &str,
) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::Auth(format!("invalid api secret: {}", e)))?;
    mac.update(format!("{}{}{}{}", timestamp, api_key, recv_window_ms, payload).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Map a non-zero `retCode` onto the error taxonomy
fn map_ret_code(code: i64, message: String) -> ExchangeError {
    match code {
        10006 | 10018 => ExchangeError::RateLimited(message),
        10003 | 10004 | 10005 | 33004 => ExchangeError::Auth(message),
        10001 if message.to_lowercase().contains("symbol") => ExchangeError::InvalidSymbol(message),
        _ => ExchangeError::Rejected { code, message },
    }
}

fn parse_number(raw: &str, field: &str) -> Result<f64, ExchangeError> {
    raw.parse::<f64>()
        .map_err(|_| ExchangeError::Decode(format!("{} is not a number: {:?}", field, raw)))
}

fn parse_kline_row(row: &[String]) -> Result<Candle, ExchangeError> {
    if row.len() < 6 {
        return Err(ExchangeError::Decode(format!(
            "kline row has {} fields, expected at least 6",
            row.len()
        )));
    }

    let timestamp = row[0]
        .parse::<i64>()
        .map_err(|_| ExchangeError::Decode(format!("kline start time {:?}", row[0])))?;

    Ok(Candle {
        timestamp,
        open: parse_number(&row[1], "open")?,
        high: parse_number(&row[2], "high")?,
        low: parse_number(&row[3], "low")?,
        close: parse_number(&row[4], "close")?,
        volume: parse_number(&row[5], "volume")?,
    })
}

impl BybitClient {
    pub fn new(config: &ExchangeConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        let per_second =
            NonZeroU32::new(config.requests_per_second).context("requests_per_second must be > 0")?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(per_second)));

        let credentials = match (&config.api_key, &config.api_secret) {
            (Some(api_key), Some(api_secret)) => Some(Credentials {
                api_key: api_key.clone(),
                api_secret: api_secret.clone(),
            }),
            _ => {
                tracing::warn!("Bybit credentials not configured, only public endpoints will work");
                None
            }
        };

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
            recv_window_ms: config.recv_window_ms,
            timeout_secs: config.request_timeout_secs,
            rate_limiter,
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> ExchangeError {
        if e.is_timeout() {
            ExchangeError::Timeout(self.timeout_secs)
        } else {
            ExchangeError::from(e)
        }
    }

    /// Send one request and unwrap the v5 envelope into `T`
    ///
    /// `payload` is the query string for GET and the JSON body for POST; it
    /// is also what gets signed.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        payload: String,
        signed: bool,
    ) -> Result<T, ExchangeError> {
        self.rate_limiter.until_ready().await;

        let is_get = method == Method::GET;
        let url = if is_get && !payload.is_empty() {
            format!("{}{}?{}", self.base_url, path, payload)
        } else {
            format!("{}{}", self.base_url, path)
        };

        let mut builder = self.client.request(method, &url);
        if signed {
            let credentials = self
                .credentials
                .as_ref()
                .ok_or_else(|| ExchangeError::Auth("API key and secret are not configured".into()))?;
            let timestamp = chrono::Utc::now().timestamp_millis();
            let signature = sign_payload(
                &credentials.api_secret,
                timestamp,
                &credentials.api_key,
                self.recv_window_ms,
                &payload,
            )?;
            builder = builder
                .header("X-BAPI-API-KEY", &credentials.api_key)
                .header("X-BAPI-TIMESTAMP", timestamp.to_string())
                .header("X-BAPI-SIGN", signature)
                .header("X-BAPI-RECV-WINDOW", self.recv_window_ms.to_string());
        }
        if !is_get {
            builder = builder
                .header("Content-Type", "application/json")
                .body(payload);
        }

        let response = builder.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(ExchangeError::RateLimited(format!("HTTP 429 on {}", path)))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ExchangeError::Auth(format!("HTTP {} on {}", status.as_u16(), path)))
            }
            s if s.is_server_error() => {
                return Err(ExchangeError::Network(format!("HTTP {} on {}", s.as_u16(), path)))
            }
            _ => {}
        }

        let envelope: ApiResponse = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) if !status.is_success() => {
                return Err(ExchangeError::Rejected {
                    code: i64::from(status.as_u16()),
                    message: format!("{} ({})", body.trim(), e),
                })
            }
            Err(e) => return Err(e.into()),
        };

        if envelope.ret_code != 0 {
            tracing::debug!(
                "Bybit {} returned retCode {}: {}",
                path,
                envelope.ret_code,
                envelope.ret_msg
            );
            return Err(map_ret_code(envelope.ret_code, envelope.ret_msg));
        }

        Ok(serde_json::from_value(envelope.result)?)
    }
}

#[async_trait]
impl CandleSource for BybitClient {
    async fn get_candles(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let limit = limit.clamp(1, MAX_KLINE_LIMIT).to_string();
        let query = serde_urlencoded::to_string([
            ("category", CATEGORY),
            ("symbol", symbol.as_str()),
            ("interval", timeframe.exchange_interval()),
            ("limit", limit.as_str()),
        ])
        .map_err(|e| ExchangeError::InvalidOrder(e.to_string()))?;

        let result: KlineResult = self
            .request(Method::GET, "/v5/market/kline", query, false)
            .await?;

        // Newest first on the wire
        let mut candles = result
            .list
            .iter()
            .map(|row| parse_kline_row(row))
            .collect::<Result<Vec<_>, _>>()?;
        candles.sort_by_key(|c| c.timestamp);
        candles.dedup_by_key(|c| c.timestamp);

        tracing::debug!(
            "Fetched {} {} candles for {}",
            candles.len(),
            timeframe,
            symbol
        );
        Ok(candles)
    }
}

#[async_trait]
impl ExchangeTrading for BybitClient {
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck, ExchangeError> {
        let params = &order.params;
        let body = OrderCreateBody {
            category: CATEGORY,
            symbol: order.symbol.as_str(),
            side: order.side.to_string(),
            order_type: order.order_type.as_str(),
            qty: decimal_string(order.amount)?,
            price: order.price.map(decimal_string).transpose()?,
            trigger_price: params.trigger_price.map(decimal_string).transpose()?,
            trigger_direction: params.trigger_direction.map(|d| d.code()),
            trigger_by: params.trigger_by.map(|s| s.as_str()),
            reduce_only: params.reduce_only,
            order_link_id: params.client_order_id.as_deref(),
        };
        let payload = serde_json::to_string(&body)?;

        let result: OrderCreateResult = self
            .request(Method::POST, "/v5/order/create", payload, true)
            .await?;

        Ok(OrderAck {
            order_id: result.order_id,
        })
    }

    async fn get_positions(&self, symbol: &Symbol) -> Result<Vec<PositionRecord>, ExchangeError> {
        let query = serde_urlencoded::to_string([("category", CATEGORY), ("symbol", symbol.as_str())])
            .map_err(|e| ExchangeError::InvalidOrder(e.to_string()))?;

        let result: PositionListResult = self
            .request(Method::GET, "/v5/position/list", query, true)
            .await?;

        result
            .list
            .into_iter()
            .map(|entry| {
                let side = match entry.side.as_str() {
                    "Buy" => Some(Side::Buy),
                    "Sell" => Some(Side::Sell),
                    _ => None,
                };
                Ok(PositionRecord {
                    size: parse_number(&entry.size, "size")?,
                    symbol: entry.symbol,
                    side,
                })
            })
            .collect()
    }
}
