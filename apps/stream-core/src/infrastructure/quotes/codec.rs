//! Snapshot Message Parsing
//!
//! The price feed pushes JSON objects mapping identifier to a price record.
//! Full snapshots and incremental updates share the same shape and merge
//! identically, so one parser handles both. Entry order within a message is
//! preserved so fan-out callbacks fire in the order received.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::application::ports::QuoteSyncError;
use crate::domain::quotes::{PriceSnapshot, Symbol};

/// Raw per-identifier record from the feed.
#[derive(Debug, Deserialize)]
struct RawSnapshot {
    /// Last price.
    price: f64,
    /// Absolute change.
    change: f64,
    /// Percentage change.
    #[serde(rename = "changePercent")]
    change_percent: f64,
}

/// Parse one inbound message into an ordered snapshot batch.
///
/// Entries that fail to parse are dropped individually; the rest of the
/// batch is still applied. A message that is not a JSON object at all is an
/// error.
///
/// # Errors
///
/// Returns an error if the payload is not a JSON object.
pub fn parse_snapshot_batch(
    payload: &str,
) -> Result<Vec<(Symbol, PriceSnapshot)>, QuoteSyncError> {
    let object: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(payload).map_err(|e| QuoteSyncError::ParseError {
            message: e.to_string(),
        })?;

    let mut batch = Vec::with_capacity(object.len());
    for (symbol, value) in object {
        match serde_json::from_value::<RawSnapshot>(value) {
            Ok(raw) => batch.push((
                symbol,
                PriceSnapshot::new(
                    decimal_from_f64(raw.price),
                    decimal_from_f64(raw.change),
                    decimal_from_f64(raw.change_percent),
                ),
            )),
            Err(e) => {
                tracing::debug!(%symbol, error = %e, "Dropping malformed snapshot entry");
            }
        }
    }

    Ok(batch)
}

/// Convert an f64 wire value to a Decimal.
fn decimal_from_f64(value: f64) -> Decimal {
    Decimal::try_from(value).unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_snapshot_batch_in_document_order() {
        let payload = r#"{
            "MSFT": {"price": 375.25, "change": -1.50, "changePercent": -0.40},
            "AAPL": {"price": 185.50, "change": 1.25, "changePercent": 0.68}
        }"#;

        let batch = parse_snapshot_batch(payload).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].0, "MSFT");
        assert_eq!(batch[1].0, "AAPL");
        assert_eq!(batch[1].1.price, Decimal::try_from(185.50).unwrap());
        assert_eq!(batch[0].1.change, Decimal::try_from(-1.50).unwrap());
    }

    #[test]
    fn empty_object_yields_empty_batch() {
        assert!(parse_snapshot_batch("{}").unwrap().is_empty());
    }

    #[test]
    fn malformed_entry_is_dropped_entry_wise() {
        let payload = r#"{
            "AAPL": {"price": 185.50, "change": 1.25, "changePercent": 0.68},
            "MSFT": {"price": "not a number"},
            "NVDA": {"price": 890.10, "change": 12.30, "changePercent": 1.40}
        }"#;

        let batch = parse_snapshot_batch(payload).unwrap();
        let symbols: Vec<&str> = batch.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "NVDA"]);
    }

    #[test]
    fn non_object_payload_is_an_error() {
        assert!(parse_snapshot_batch("[1,2,3]").is_err());
        assert!(parse_snapshot_batch("not json").is_err());
    }
}
