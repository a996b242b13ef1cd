//! Search-performance tools available to the assistant.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{ToolError, ToolHandler};

pub struct CalculateCtr;

pub struct AggregateSearchMetrics;

const CLICK_KEYS: &[&str] = &["clicks", "total_clicks"];
const IMPRESSION_KEYS: &[&str] = &["impressions", "total_impressions"];
const POSITION_KEYS: &[&str] = &["position", "avg_pos"];

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn ctr_percent(clicks: f64, impressions: f64) -> f64 {
    if impressions > 0.0 {
        round2(clicks / impressions * 100.0)
    } else {
        0.0
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// First field whose lowercased name is one of `keys`, read as a number
fn lookup(row: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| {
        row.iter()
            .find(|(name, _)| name.to_lowercase() == *key)
            .and_then(|(_, value)| as_number(value))
    })
}

fn required_number(params: &Value, key: &str) -> Result<f64, ToolError> {
    params
        .get(key)
        .and_then(as_number)
        .filter(|n| *n >= 0.0)
        .ok_or_else(|| {
            ToolError::InvalidParameters(format!("'{}' must be a non-negative number", key))
        })
}

#[async_trait]
impl ToolHandler for CalculateCtr {
    fn name(&self) -> &'static str {
        "calculate_ctr"
    }

    fn description(&self) -> &'static str {
        "Calculate the click-through rate (as a percentage) from clicks and impressions."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "clicks": {"type": "number", "description": "Number of clicks"},
                "impressions": {"type": "number", "description": "Number of impressions"}
            },
            "required": ["clicks", "impressions"]
        })
    }

    async fn call(&self, params: Value) -> Result<Value, ToolError> {
        let clicks = required_number(&params, "clicks")?;
        let impressions = required_number(&params, "impressions")?;
        if impressions == 0.0 {
            return Err(ToolError::InvalidParameters(
                "'impressions' must be greater than zero".to_string(),
            ));
        }

        Ok(json!({
            "clicks": clicks,
            "impressions": impressions,
            "ctr": ctr_percent(clicks, impressions),
        }))
    }
}

#[async_trait]
impl ToolHandler for AggregateSearchMetrics {
    fn name(&self) -> &'static str {
        "aggregate_search_metrics"
    }

    fn description(&self) -> &'static str {
        "Summarize search performance rows into total clicks, total impressions, \
         average position and overall click-through rate."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "rows": {
                    "type": "array",
                    "description": "Search performance rows",
                    "items": {
                        "type": "object",
                        "properties": {
                            "clicks": {"type": "number"},
                            "impressions": {"type": "number"},
                            "position": {"type": "number"}
                        }
                    }
                }
            },
            "required": ["rows"]
        })
    }

    async fn call(&self, params: Value) -> Result<Value, ToolError> {
        let rows = params
            .get("rows")
            .and_then(Value::as_array)
            .ok_or_else(|| ToolError::InvalidParameters("'rows' must be an array".to_string()))?;
        if rows.is_empty() {
            return Err(ToolError::InvalidParameters(
                "'rows' must not be empty".to_string(),
            ));
        }

        let mut clicks = 0.0;
        let mut impressions = 0.0;
        let mut position_sum = 0.0;
        let mut positioned = 0usize;

        for row in rows.iter().filter_map(Value::as_object) {
            clicks += lookup(row, CLICK_KEYS).unwrap_or(0.0);
            impressions += lookup(row, IMPRESSION_KEYS).unwrap_or(0.0);
            if let Some(position) = lookup(row, POSITION_KEYS).filter(|p| *p > 0.0) {
                position_sum += position;
                positioned += 1;
            }
        }

        let average_position = if positioned > 0 {
            round2(position_sum / positioned as f64)
        } else {
            0.0
        };

        Ok(json!({
            "totalClicks": clicks,
            "totalImpressions": impressions,
            "averagePosition": average_position,
            "ctr": ctr_percent(clicks, impressions),
            "recordCount": rows.len(),
        }))
    }
}
