//! # Totals Subcommand
//!
//! Reads line items from a file and prints the computed invoice totals as
//! JSON. The file holds either a bare array of line items or an object
//! `{ items, tdsRate }`; `.yaml`/`.yml` files are parsed as YAML, anything
//! else as JSON.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use rust_decimal::Decimal;
use serde::Deserialize;

use fwd_ledger::{calculate, validate_line_items, validate_tds_rate, InvoiceTotals, LineItem};

/// Arguments for `fwd totals`.
#[derive(Args, Debug)]
pub struct TotalsArgs {
    /// JSON or YAML file of line items.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// TDS percentage. Overrides `tdsRate` from the file.
    #[arg(long)]
    pub tds_rate: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TotalsInput {
    Items(Vec<LineItem>),
    Invoice {
        #[serde(default)]
        items: Vec<LineItem>,
        #[serde(default, rename = "tdsRate")]
        tds_rate: Decimal,
    },
}

impl TotalsInput {
    fn into_parts(self) -> (Vec<LineItem>, Decimal) {
        match self {
            Self::Items(items) => (items, Decimal::ZERO),
            Self::Invoice { items, tds_rate } => (items, tds_rate),
        }
    }
}

/// Execute `fwd totals`.
pub fn run_totals(args: &TotalsArgs) -> Result<u8> {
    let totals = compute_from_file(&args.file, args.tds_rate)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&totals).context("failed to serialize totals")?
    );
    Ok(0)
}

/// Load `path` and compute its totals.
pub fn compute_from_file(path: &Path, tds_override: Option<Decimal>) -> Result<InvoiceTotals> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read line items: {}", path.display()))?;

    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
    let input: TotalsInput = if is_yaml {
        serde_yaml::from_str(&raw)
            .with_context(|| format!("invalid YAML line items: {}", path.display()))?
    } else {
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid JSON line items: {}", path.display()))?
    };

    let (items, file_rate) = input.into_parts();
    let tds_rate = validate_tds_rate(tds_override.unwrap_or(file_rate))?;
    validate_line_items(&items)?;
    tracing::debug!(items = items.len(), %tds_rate, "computing invoice totals");
    Ok(calculate(&items, tds_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn json_array_of_items() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");
        std::fs::write(
            &path,
            r#"[{"quantity": 2, "rate": 100, "taxRate": 10}, {"quantity": 1, "rate": 50}]"#,
        )
        .unwrap();

        let totals = compute_from_file(&path, None).unwrap();
        assert_eq!(totals.subtotal, dec!(250));
        assert_eq!(totals.total_tax, dec!(20));
        assert_eq!(totals.tds_amount, Decimal::ZERO);
        assert_eq!(totals.amount, dec!(270));
    }

    #[test]
    fn yaml_invoice_with_tds_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice.yaml");
        std::fs::write(
            &path,
            "tdsRate: 2\nitems:\n  - quantity: 1\n    rate: 200\n    taxRate: 10\n",
        )
        .unwrap();

        let totals = compute_from_file(&path, None).unwrap();
        assert_eq!(totals.tds_amount, dec!(4.4));
        assert_eq!(totals.amount, dec!(215.6));

        let overridden = compute_from_file(&path, Some(Decimal::ZERO)).unwrap();
        assert_eq!(overridden.amount, dec!(220));
    }

    #[test]
    fn negative_tds_rate_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");
        std::fs::write(&path, "[]").unwrap();
        let err = compute_from_file(&path, Some(dec!(-1))).unwrap_err();
        assert!(err.to_string().contains("tdsRate"), "{err}");
    }

    #[test]
    fn oversized_rate_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");
        std::fs::write(&path, r#"[{"quantity": 1, "rate": 5000000000000}]"#).unwrap();
        let err = compute_from_file(&path, None).unwrap_err();
        assert!(err.to_string().contains("rate"), "{err}");
    }

    #[test]
    fn missing_file_names_path() {
        let err = compute_from_file(Path::new("/nonexistent/items.json"), None).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/items.json"));
    }
}
