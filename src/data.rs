//! Price data loading
//!
//! Replays are read from CSV files with a `datetime,symbol,price` header.
//! Timestamps are exchange-local.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::path::Path;
use tracing::{info, warn};

use crate::{Money, Symbol};

/// One last-traded-price observation
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTick {
    pub datetime: NaiveDateTime,
    pub symbol: Symbol,
    pub price: Money,
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M"))
        .with_context(|| format!("Failed to parse datetime: {}", s))
}

/// Load price ticks from a CSV file, sorted by time
pub fn load_price_ticks(path: impl AsRef<Path>) -> Result<Vec<PriceTick>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

    let mut ticks = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.context(format!("Failed to read row {}", row_idx + 1))?;

        let datetime = parse_datetime(record.get(0).context("Missing datetime column")?.trim())?;
        let symbol = record.get(1).context("Missing symbol column")?.trim();
        let price: f64 = record
            .get(2)
            .context("Missing price column")?
            .trim()
            .parse()
            .context(format!("Failed to parse price in row {}", row_idx + 1))?;

        if !price.is_finite() || price <= 0.0 {
            warn!(row = row_idx + 1, symbol, price, "Skipping non-positive price");
            continue;
        }

        ticks.push(PriceTick {
            datetime,
            symbol: Symbol::new(symbol),
            price: Money::from_f64(price),
        });
    }

    // Stable sort keeps file order within a timestamp
    ticks.sort_by_key(|tick| tick.datetime);
    info!(path = %path.display(), ticks = ticks.len(), "Loaded price ticks");
    Ok(ticks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_price_ticks_sorted() {
        let path = std::env::temp_dir().join(format!("straddle_ticks_{}.csv", std::process::id()));
        {
            let mut file = std::fs::File::create(&path).unwrap();
            writeln!(file, "datetime,symbol,price").unwrap();
            writeln!(file, "2023-10-16 09:17:00,NIFTY 50,19512.35").unwrap();
            writeln!(file, "2023-10-16 09:16:00,NIFTY 50,19500.10").unwrap();
            writeln!(file, "2023-10-16 09:16:00,NIFTY19OCT2319500CE,101.5").unwrap();
            writeln!(file, "2023-10-16 09:16:00,BROKEN,0").unwrap();
        }

        let ticks = load_price_ticks(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(ticks.len(), 3);
        assert_eq!(ticks[0].symbol.as_str(), "NIFTY 50");
        assert_eq!(ticks[1].symbol.as_str(), "NIFTY19OCT2319500CE");
        assert_eq!(ticks[2].price, Money::from_f64(19512.35));
    }

    #[test]
    fn test_parse_datetime_formats() {
        assert!(parse_datetime("2023-10-16T09:16:00").is_ok());
        assert!(parse_datetime("2023-10-16 09:16").is_ok());
        assert!(parse_datetime("16/10/2023").is_err());
    }
}
