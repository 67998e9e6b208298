//! Valuation report export.
//!
//! Produces one row per valued movement. The delimiter and decimal separator
//! come from an [`ExportLocale`]; nothing here assumes a region.

use std::io::Write;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::Direction;
use crate::movement::ProductSnapshot;
use crate::valuation::ValuationStep;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write report: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to flush report: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid export locale: {0}")]
    Locale(String),
}

/// Delimiter / decimal-separator convention of an export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportLocale {
    pub delimiter: char,
    pub decimal_separator: char,
    /// `chrono` format string for the date column.
    pub date_format: String,
}

impl Default for ExportLocale {
    fn default() -> Self {
        Self {
            delimiter: ',',
            decimal_separator: '.',
            date_format: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }
}

impl ExportLocale {
    /// Semicolon-delimited, decimal comma.
    pub fn semicolon_decimal_comma() -> Self {
        Self {
            delimiter: ';',
            decimal_separator: ',',
            ..Self::default()
        }
    }

    fn delimiter_byte(&self) -> Result<u8, ExportError> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| ExportError::Locale(format!("delimiter {:?} is not ASCII", self.delimiter)))
    }

    pub fn format_number(&self, value: f64, decimals: usize) -> String {
        let s = format!("{value:.decimals$}");
        if self.decimal_separator == '.' {
            s
        } else {
            s.replace('.', &self.decimal_separator.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub date: chrono::DateTime<chrono::Utc>,
    pub reference: String,
    pub direction: Direction,
    pub product_code: String,
    pub product_name: String,
    pub quantity: f64,
    pub unit_cost: f64,
    pub cump: f64,
    pub total_value: f64,
}

impl ReportRow {
    /// Build a row from a timeline step. Product labels come from the step
    /// when the movement payload carried them, else from the snapshot.
    pub fn from_step(step: &ValuationStep, product: Option<&ProductSnapshot>) -> Self {
        let code = step
            .product_code
            .clone()
            .or_else(|| product.map(|p| p.code.clone()))
            .unwrap_or_default();
        let name = step
            .product_name
            .clone()
            .or_else(|| product.map(|p| p.name.clone()))
            .unwrap_or_default();
        Self {
            date: step.timestamp,
            reference: step.reference.clone(),
            direction: step.direction,
            product_code: code,
            product_name: name,
            quantity: step.quantity,
            unit_cost: step.unit_cost,
            cump: step.cump,
            total_value: step.stock_value,
        }
    }
}

const HEADER: [&str; 9] = [
    "date",
    "reference",
    "direction",
    "product_code",
    "product_name",
    "quantity",
    "unit_cost",
    "cump",
    "total_value",
];

/// Write `rows` as delimited text.
pub fn write_report<W: Write>(rows: &[ReportRow], locale: &ExportLocale, out: W) -> Result<(), ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(locale.delimiter_byte()?)
        .from_writer(out);

    writer.write_record(HEADER)?;
    for row in rows {
        writer.write_record([
            row.date.format(&locale.date_format).to_string(),
            row.reference.clone(),
            row.direction.as_str().to_string(),
            row.product_code.clone(),
            row.product_name.clone(),
            locale.format_number(row.quantity, 2),
            locale.format_number(row.unit_cost, 4),
            locale.format_number(row.cump, 4),
            locale.format_number(row.total_value, 2),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use stockval_core::{MovementId, ProductId};

    fn step() -> ValuationStep {
        ValuationStep {
            movement_id: MovementId::new(1),
            timestamp: Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap(),
            reference: "WH/IN/00001".to_string(),
            direction: Direction::Inbound,
            quantity: 120.0,
            unit_cost: 14.0,
            cump: 35.0 / 3.0,
            net_quantity: 120.0,
            stock_value: 1400.0,
            product_code: None,
            product_name: Some("Widget, large".to_string()),
        }
    }

    fn snapshot() -> ProductSnapshot {
        ProductSnapshot {
            product_id: ProductId::new(1),
            code: "WID-L".to_string(),
            name: "ignored".to_string(),
            reported_quantity: 0.0,
            standard_cost: 0.0,
        }
    }

    #[test]
    fn default_locale_writes_comma_separated_rows() {
        let row = ReportRow::from_step(&step(), Some(&snapshot()));
        assert_eq!(row.product_code, "WID-L");
        assert_eq!(row.product_name, "Widget, large");

        let mut buf = Vec::new();
        write_report(&[row], &ExportLocale::default(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "date,reference,direction,product_code,product_name,quantity,unit_cost,cump,total_value"
        );
        assert_eq!(
            lines.next().unwrap(),
            "2024-02-03 04:05:06,WH/IN/00001,in,WID-L,\"Widget, large\",120.00,14.0000,11.6667,1400.00"
        );
    }

    #[test]
    fn decimal_comma_locale_uses_semicolons() {
        let row = ReportRow::from_step(&step(), None);
        let mut buf = Vec::new();
        write_report(&[row], &ExportLocale::semicolon_decimal_comma(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let data = text.lines().nth(1).unwrap();
        assert_eq!(
            data,
            "2024-02-03 04:05:06;WH/IN/00001;in;;Widget, large;120,00;14,0000;11,6667;1400,00"
        );
    }

    #[test]
    fn non_ascii_delimiter_is_rejected() {
        let locale = ExportLocale {
            delimiter: '§',
            ..ExportLocale::default()
        };
        let err = write_report(&[], &locale, Vec::new()).unwrap_err();
        assert!(matches!(err, ExportError::Locale(_)));
    }
}
