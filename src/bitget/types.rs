//! Wire types for the Bitget v2 spot REST API
//!
//! Numeric fields arrive as strings; they are parsed on the way into the
//! grid types so a malformed value surfaces as a decode error with context.

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::grid::{OpenOrder, OrderDetail, OrderSide, OrderStatus};

/// Common response envelope: `{"code": "00000", "msg": "success", "data": ...}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub code: String,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker {
    pub symbol: String,
    pub last_pr: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnfilledOrder {
    pub order_id: String,
    pub side: String,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub price_avg: Option<String>,
    pub size: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderInfo {
    pub order_id: String,
    pub status: String,
    #[serde(default)]
    pub price_avg: Option<String>,
    #[serde(default)]
    pub base_volume: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub symbol: String,
    pub side: String,
    pub order_type: String,
    pub force: String,
    pub price: String,
    pub size: String,
    pub client_oid: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderResponse {
    pub order_id: String,
    #[serde(default)]
    pub client_oid: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderRequest {
    pub symbol: String,
    pub order_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetBalance {
    pub coin: String,
    pub available: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    pub price_precision: String,
    pub quantity_precision: String,
}

/// Parse a decimal string field
pub(crate) fn parse_decimal(endpoint: &str, field: &str, value: &str) -> Result<f64> {
    let parsed = value.trim().parse::<f64>().map_err(|e| Error::Decode {
        endpoint: endpoint.to_string(),
        message: format!("field {field}={value:?}: {e}"),
    })?;
    if !parsed.is_finite() {
        return Err(Error::Decode {
            endpoint: endpoint.to_string(),
            message: format!("field {field}={value:?} is not finite"),
        });
    }
    Ok(parsed)
}

/// Parse an optional decimal, treating empty and zero as absent
fn parse_positive(endpoint: &str, field: &str, value: Option<&str>) -> Result<Option<f64>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => {
            let parsed = parse_decimal(endpoint, field, v)?;
            Ok((parsed > 0.0).then_some(parsed))
        }
    }
}

impl UnfilledOrder {
    pub(crate) fn into_open_order(self, endpoint: &str) -> Result<OpenOrder> {
        let raw_price = self
            .price
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .or(self.price_avg.as_deref())
            .unwrap_or("");
        let side = OrderSide::try_from(self.side.as_str()).map_err(|message| Error::Decode {
            endpoint: endpoint.to_string(),
            message: format!("order {}: {message}", self.order_id),
        })?;
        Ok(OpenOrder {
            price: parse_decimal(endpoint, "price", raw_price)?,
            quantity: parse_decimal(endpoint, "size", &self.size)?,
            side,
            order_id: self.order_id,
        })
    }
}

impl OrderInfo {
    pub(crate) fn into_detail(self, endpoint: &str) -> Result<OrderDetail> {
        let status = match self.status.to_lowercase().as_str() {
            "filled" | "full_fill" => OrderStatus::Filled,
            "cancelled" | "canceled" => OrderStatus::Canceled,
            "rejected" | "failed" => OrderStatus::Rejected,
            _ => OrderStatus::Open,
        };
        Ok(OrderDetail {
            status,
            filled_price: parse_positive(endpoint, "priceAvg", self.price_avg.as_deref())?,
            filled_quantity: parse_positive(endpoint, "baseVolume", self.base_volume.as_deref())?,
        })
    }
}
