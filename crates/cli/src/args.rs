//! Command-line arguments.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use stockval_core::{MovementId, ProductId};

/// Weighted-average stock valuation against an ERP backend.
///
/// Backend access and export format come from `STOCKVAL_*` environment
/// variables; logging follows `RUST_LOG` and `STOCKVAL_LOG_FORMAT`.
#[derive(Parser, Debug)]
#[command(name = "stockval", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Value products and print the valuation report
    Value {
        /// Product ids, space- or comma-separated
        #[arg(required = true, value_delimiter = ',')]
        products: Vec<ProductId>,

        /// Value as of the end of this day (YYYY-MM-DD, UTC)
        #[arg(long, value_name = "DATE")]
        as_of: Option<NaiveDate>,
    },

    /// Compare backend quantities with the movement history
    Reconcile {
        /// Product ids, space- or comma-separated
        #[arg(required = true, value_delimiter = ',')]
        products: Vec<ProductId>,

        /// Book the proposed adjustments
        #[arg(long)]
        apply: bool,
    },

    /// Correct the unit cost of a receipt
    Correct {
        movement: MovementId,

        #[arg(allow_negative_numbers = true)]
        cost: f64,
    },
}
