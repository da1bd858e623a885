//! Canonical order model and normalisation
//!
//! Offline POS orders list their lines under `products[]`; marketplace
//! orders nest them under `itemInfo.items[]`, with slightly different field
//! names. Everything downstream of [`normalize_order`] sees one shape.
//!
//! Normalisation never fails: a partially correct printout beats none, so
//! missing or malformed fields become zero / empty.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Where the order came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSource {
    Online,
    #[default]
    Offline,
}

/// One line item
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl OrderLine {
    pub fn new(name: impl Into<String>, quantity: u32, unit_price: Decimal) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit_price,
            ..Default::default()
        }
    }

    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// 规范化订单
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub source: OrderSource,
    #[serde(default)]
    pub lines: Vec<OrderLine>,
    #[serde(default)]
    pub service_fee: Option<Decimal>,
    #[serde(default)]
    pub discount: Option<Decimal>,
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl Order {
    pub fn new(id: impl Into<String>, lines: Vec<OrderLine>) -> Self {
        Self {
            id: id.into(),
            lines,
            ..Default::default()
        }
    }

    /// Number shown to staff, falling back to the id
    pub fn display_number(&self) -> &str {
        self.order_number.as_deref().unwrap_or(&self.id)
    }
}

/// Build a canonical [`Order`] from either source shape
///
/// Already-canonical payloads (with `lines[]`) are accepted as well.
pub fn normalize_order(raw: &Value) -> Order {
    let (source, items) = if let Some(products) = raw.get("products").and_then(Value::as_array) {
        (OrderSource::Offline, products.as_slice())
    } else if let Some(items) = raw
        .get("itemInfo")
        .and_then(|info| info.get("items"))
        .and_then(Value::as_array)
    {
        (OrderSource::Online, items.as_slice())
    } else if let Some(lines) = raw.get("lines").and_then(Value::as_array) {
        (
            str_field(raw, &["source"])
                .and_then(|s| serde_json::from_value::<OrderSource>(Value::String(s)).ok())
                .unwrap_or_default(),
            lines.as_slice(),
        )
    } else {
        (OrderSource::Offline, &[][..])
    };

    let item_info = raw.get("itemInfo");
    let money = |keys: &[&str]| {
        decimal_field(raw, keys).or_else(|| item_info.and_then(|info| decimal_field(info, keys)))
    };

    Order {
        id: str_field(raw, &["id", "orderId", "order_id", "_id"]).unwrap_or_default(),
        order_number: str_field(
            raw,
            &["orderNumber", "order_number", "displayId", "shortCode", "number"],
        ),
        source,
        lines: items.iter().map(normalize_line).collect(),
        service_fee: money(&["serviceFee", "service_fee"]),
        discount: money(&["discount", "discountAmount"]),
        table_name: str_field(raw, &["tableName", "table_name", "table"]),
        created_at: raw
            .get("createdAt")
            .or_else(|| raw.get("created_at"))
            .and_then(Value::as_i64),
    }
}

fn normalize_line(item: &Value) -> OrderLine {
    let options = item
        .get("options")
        .or_else(|| item.get("modifiers"))
        .and_then(Value::as_array)
        .map(|opts| {
            opts.iter()
                .filter_map(|o| match o {
                    Value::String(s) => Some(s.clone()),
                    other => str_field(other, &["name", "optionName", "title"]),
                })
                .collect()
        })
        .unwrap_or_default();

    OrderLine {
        name: str_field(item, &["name", "productName", "title"]).unwrap_or_default(),
        quantity: quantity_field(item),
        unit_price: decimal_field(item, &["price", "unitPrice", "unit_price"])
            .unwrap_or(Decimal::ZERO),
        options,
        note: str_field(item, &["note", "remark", "comment"]).filter(|n| !n.is_empty()),
    }
}

fn str_field(v: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match v.get(*k)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn decimal_field(v: &Value, keys: &[&str]) -> Option<Decimal> {
    keys.iter().find_map(|k| match v.get(*k)? {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s.trim()),
        _ => None,
    })
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

fn quantity_field(item: &Value) -> u32 {
    let raw = item.get("quantity").or_else(|| item.get("qty"));
    let q = match raw {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.floor() as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse::<i64>().unwrap_or(0),
        _ => 0,
    };
    q.clamp(0, u32::MAX as i64) as u32
}
