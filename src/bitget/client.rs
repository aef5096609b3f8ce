use std::fmt;
use std::time::Duration;

use chrono::Utc;
use log::debug;
use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::consts::{BITGET_API_URL, DEFAULT_TIMEOUT_SECS, SUCCESS_CODE};
use crate::errors::{Error, Result};
use crate::grid::{AssetPrecision, OpenOrder, OrderDetail, OrderSide};

use super::signature::sign_request;
use super::types::{
    parse_decimal, ApiResponse, AssetBalance, CancelOrderRequest, OrderInfo, PlaceOrderRequest,
    PlaceOrderResponse, SymbolInfo, Ticker, UnfilledOrder,
};

const TICKERS: &str = "/api/v2/spot/market/tickers";
const UNFILLED_ORDERS: &str = "/api/v2/spot/trade/unfilled-orders";
const ORDER_INFO: &str = "/api/v2/spot/trade/orderInfo";
const PLACE_ORDER: &str = "/api/v2/spot/trade/place-order";
const CANCEL_ORDER: &str = "/api/v2/spot/trade/cancel-order";
const ASSETS: &str = "/api/v2/spot/account/assets";
const SYMBOLS: &str = "/api/v2/spot/public/symbols";

/// API key material. Opaque: never printed, not even in debug output.
#[derive(Clone)]
pub struct ApiCredentials {
    api_key: String,
    api_secret: String,
    passphrase: String,
}

impl ApiCredentials {
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            passphrase: passphrase.into(),
        }
    }
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

/// Signed REST client for Bitget spot trading
#[derive(Debug, Clone)]
pub struct BitgetClient {
    http: Client,
    base_url: String,
    credentials: ApiCredentials,
}

impl BitgetClient {
    pub fn new(
        base_url: Option<String>,
        credentials: ApiCredentials,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout.unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)))
            .build()
            .map_err(|e| Error::Http {
                endpoint: "client".to_string(),
                status: None,
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            base_url: base_url
                .unwrap_or_else(|| BITGET_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn ticker(&self, symbol: &str) -> Result<Ticker> {
        let tickers: Vec<Ticker> = self
            .request(Method::GET, TICKERS, &[("symbol", symbol)], None::<&()>)
            .await?;
        tickers
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidResponse {
                endpoint: TICKERS.to_string(),
                message: format!("no ticker for {symbol}"),
            })
    }

    pub async fn last_price(&self, symbol: &str) -> Result<f64> {
        let ticker = self.ticker(symbol).await?;
        let price = parse_decimal(TICKERS, "lastPr", &ticker.last_pr)?;
        if !price.is_finite() || price <= 0.0 {
            return Err(Error::InvalidResponse {
                endpoint: TICKERS.to_string(),
                message: format!("non-positive price {price} for {symbol}"),
            });
        }
        Ok(price)
    }

    pub async fn unfilled_orders(&self, symbol: &str) -> Result<Vec<OpenOrder>> {
        let orders: Vec<UnfilledOrder> = self
            .request(Method::GET, UNFILLED_ORDERS, &[("symbol", symbol)], None::<&()>)
            .await
            .or_else(empty_on_missing_data)?;
        orders
            .into_iter()
            .map(|o| o.into_open_order(UNFILLED_ORDERS))
            .collect()
    }

    pub async fn order_info(&self, symbol: &str, order_id: &str) -> Result<OrderDetail> {
        let infos: Vec<OrderInfo> = self
            .request(
                Method::GET,
                ORDER_INFO,
                &[("symbol", symbol), ("orderId", order_id)],
                None::<&()>,
            )
            .await?;
        infos
            .into_iter()
            .find(|info| info.order_id == order_id)
            .ok_or_else(|| Error::InvalidResponse {
                endpoint: ORDER_INFO.to_string(),
                message: format!("order {order_id} not found"),
            })?
            .into_detail(ORDER_INFO)
    }

    pub async fn place_limit_order(
        &self,
        symbol: &str,
        side: OrderSide,
        price: f64,
        quantity: f64,
        precision: &AssetPrecision,
    ) -> Result<String> {
        let body = PlaceOrderRequest {
            symbol: symbol.to_string(),
            side: side.as_str().to_string(),
            order_type: "limit".to_string(),
            force: "gtc".to_string(),
            price: precision.format_price(price),
            size: precision.format_quantity(quantity),
            client_oid: Uuid::new_v4().simple().to_string(),
        };
        let resp: PlaceOrderResponse = self
            .request(Method::POST, PLACE_ORDER, &[], Some(&body))
            .await?;
        if resp.order_id.is_empty() {
            return Err(Error::InvalidResponse {
                endpoint: PLACE_ORDER.to_string(),
                message: "empty orderId".to_string(),
            });
        }
        Ok(resp.order_id)
    }

    pub async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<()> {
        let body = CancelOrderRequest {
            symbol: symbol.to_string(),
            order_id: order_id.to_string(),
        };
        let _: serde_json::Value = self
            .request(Method::POST, CANCEL_ORDER, &[], Some(&body))
            .await?;
        Ok(())
    }

    /// Available balance of `coin`; zero when the account holds none
    pub async fn available_balance(&self, coin: &str) -> Result<f64> {
        let assets: Vec<AssetBalance> = self
            .request(Method::GET, ASSETS, &[("coin", coin)], None::<&()>)
            .await
            .or_else(empty_on_missing_data)?;
        match assets.iter().find(|a| a.coin.eq_ignore_ascii_case(coin)) {
            Some(asset) => parse_decimal(ASSETS, "available", &asset.available),
            None => Ok(0.0),
        }
    }

    pub async fn symbol_precision(&self, symbol: &str) -> Result<AssetPrecision> {
        let infos: Vec<SymbolInfo> = self
            .request(Method::GET, SYMBOLS, &[("symbol", symbol)], None::<&()>)
            .await?;
        let info = infos
            .into_iter()
            .find(|s| s.symbol.eq_ignore_ascii_case(symbol))
            .ok_or_else(|| Error::InvalidResponse {
                endpoint: SYMBOLS.to_string(),
                message: format!("unknown symbol {symbol}"),
            })?;
        let decimals = |field: &str, value: &str| {
            value.trim().parse::<u32>().map_err(|e| Error::Decode {
                endpoint: SYMBOLS.to_string(),
                message: format!("field {field}={value:?}: {e}"),
            })
        };
        Ok(AssetPrecision::new(
            decimals("pricePrecision", &info.price_precision)?,
            decimals("quantityPrecision", &info.quantity_precision)?,
        ))
    }

    async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request_path = with_query(path, query);
        let body = match body {
            Some(b) => serde_json::to_string(b).map_err(|e| Error::Decode {
                endpoint: path.to_string(),
                message: format!("cannot encode request body: {e}"),
            })?,
            None => String::new(),
        };

        let timestamp = Utc::now().timestamp_millis().to_string();
        let signature = sign_request(
            &self.credentials.api_secret,
            &timestamp,
            method.as_str(),
            &request_path,
            &body,
        )?;

        debug!("{} {}", method, request_path);

        let mut builder = self
            .http
            .request(method, format!("{}{}", self.base_url, request_path))
            .header("ACCESS-KEY", &self.credentials.api_key)
            .header("ACCESS-SIGN", signature)
            .header("ACCESS-TIMESTAMP", &timestamp)
            .header("ACCESS-PASSPHRASE", &self.credentials.passphrase)
            .header("Content-Type", "application/json")
            .header("locale", "en-US");
        if !body.is_empty() {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| Error::Http {
            endpoint: path.to_string(),
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| Error::Http {
            endpoint: path.to_string(),
            status: Some(status.as_u16()),
            message: e.to_string(),
        })?;

        parse_envelope(path, status.as_u16(), &text)
    }
}

/// Unwrap the response envelope, mapping non-success codes to errors
fn parse_envelope<T: DeserializeOwned>(endpoint: &str, status: u16, text: &str) -> Result<T> {
    let envelope: ApiResponse<T> = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) if (200..300).contains(&status) => {
            return Err(Error::Decode {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })
        }
        Err(_) => {
            return Err(Error::Http {
                endpoint: endpoint.to_string(),
                status: Some(status),
                message: text.chars().take(200).collect(),
            })
        }
    };

    if envelope.code != SUCCESS_CODE {
        return Err(Error::Api {
            endpoint: endpoint.to_string(),
            code: envelope.code,
            msg: envelope.msg,
        });
    }

    envelope.data.ok_or_else(|| Error::InvalidResponse {
        endpoint: endpoint.to_string(),
        message: "missing data".to_string(),
    })
}

/// List endpoints answer `data: null` when there is nothing to list
fn empty_on_missing_data<T>(err: Error) -> Result<Vec<T>> {
    match err {
        Error::InvalidResponse { ref message, .. } if message == "missing data" => Ok(Vec::new()),
        other => Err(other),
    }
}

fn with_query(path: &str, query: &[(&str, &str)]) -> String {
    if query.is_empty() {
        return path.to_string();
    }
    let pairs: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{}?{}", path, pairs.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_is_redacted() {
        let creds = ApiCredentials::new("key-123", "secret-456", "pass-789");
        let printed = format!("{creds:?}");
        assert!(!printed.contains("key-123"));
        assert!(!printed.contains("secret-456"));
        assert!(!printed.contains("pass-789"));

        let client = BitgetClient::new(None, creds, None).unwrap();
        let printed = format!("{client:?}");
        assert!(!printed.contains("secret-456"));
        assert_eq!(client.base_url(), BITGET_API_URL);
    }

    #[test]
    fn test_with_query() {
        assert_eq!(with_query(TICKERS, &[]), TICKERS);
        assert_eq!(
            with_query(ORDER_INFO, &[("symbol", "BTCUSDT"), ("orderId", "42")]),
            "/api/v2/spot/trade/orderInfo?symbol=BTCUSDT&orderId=42"
        );
    }

    #[test]
    fn test_envelope_success_and_api_error() {
        let ok: Vec<Ticker> = parse_envelope(
            TICKERS,
            200,
            r#"{"code":"00000","msg":"success","data":[{"symbol":"BTCUSDT","lastPr":"1"}]}"#,
        )
        .unwrap();
        assert_eq!(ok.len(), 1);

        let err = parse_envelope::<serde_json::Value>(
            PLACE_ORDER,
            400,
            r#"{"code":"43012","msg":"Insufficient balance","data":null}"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            Error::Api {
                endpoint: PLACE_ORDER.into(),
                code: "43012".into(),
                msg: "Insufficient balance".into(),
            }
        );
    }

    #[test]
    fn test_envelope_non_json_keeps_status() {
        let err = parse_envelope::<serde_json::Value>(TICKERS, 502, "<html>bad gateway</html>")
            .unwrap_err();
        assert_eq!(err.status(), Some(502));
        assert_eq!(err.endpoint(), Some(TICKERS));

        let err = parse_envelope::<serde_json::Value>(TICKERS, 200, "not json").unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_missing_list_data_is_empty() {
        let err = parse_envelope::<Vec<UnfilledOrder>>(
            UNFILLED_ORDERS,
            200,
            r#"{"code":"00000","msg":"success","data":null}"#,
        )
        .unwrap_err();
        let orders: Vec<UnfilledOrder> = empty_on_missing_data(err).unwrap();
        assert!(orders.is_empty());
    }
}
