//! # Live Preview
//!
//! Advisory summary recomputed on every input change. It prices the bill
//! without the safety factor, ignores the expert duct run and never fails:
//! missing or unusable values fall back to [`PreviewInput::default`].

use serde::{Deserialize, Serialize};

use crate::catalog::ApplianceSpec;
use crate::estimator::{base_subtotals, bill_of_quantities, Quantities, Subtotals, MAX_SECTIONS};
use crate::pricing::{Currency, PRICES};
use crate::units::Meters;

pub const PREVIEW_HOOD_LENGTH_M: f64 = 3.0;
pub const PREVIEW_HOOD_DEPTH_M: f64 = 1.2;
pub const PREVIEW_PLENUM_SECTIONS: u32 = 2;
pub const PREVIEW_DUCT_SECTIONS: u32 = 1;

/// Inputs to the live summary, already resolved to usable values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewInput {
    pub project_name: String,
    pub client_name: String,
    pub hood_length_m: f64,
    pub hood_depth_m: f64,
    pub plenum_sections: u32,
    pub duct_sections: u32,
    pub currency: Currency,
    pub appliances: Vec<ApplianceSpec>,
}

impl Default for PreviewInput {
    fn default() -> Self {
        PreviewInput {
            project_name: String::new(),
            client_name: String::new(),
            hood_length_m: PREVIEW_HOOD_LENGTH_M,
            hood_depth_m: PREVIEW_HOOD_DEPTH_M,
            plenum_sections: PREVIEW_PLENUM_SECTIONS,
            duct_sections: PREVIEW_DUCT_SECTIONS,
            currency: Currency::USD,
            appliances: Vec::new(),
        }
    }
}

/// Live summary shown next to the input form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewSummary {
    pub project_name: String,
    pub client_name: String,
    pub quantities: Quantities,
    /// Base currency, no safety factor
    pub subtotals: Subtotals,
    pub currency: Currency,
    pub exchange_rate: f64,
    /// Quote currency, no safety factor
    pub total_cost: f64,
}

/// Compute the live summary.
///
/// ```rust
/// use kfss_core::estimator::{preview, PreviewInput};
///
/// let summary = preview(&PreviewInput::default());
/// assert_eq!(summary.quantities.nozzles.total, 3);
/// assert!((summary.total_cost - 5140.0).abs() < 1e-9);
/// ```
pub fn preview(input: &PreviewInput) -> PreviewSummary {
    let hood_length = positive_or(input.hood_length_m, PREVIEW_HOOD_LENGTH_M);
    let hood_depth = positive_or(input.hood_depth_m, PREVIEW_HOOD_DEPTH_M);

    let quantities = bill_of_quantities(
        Meters(hood_length),
        Meters(hood_depth),
        sections_or(input.plenum_sections, PREVIEW_PLENUM_SECTIONS),
        sections_or(input.duct_sections, PREVIEW_DUCT_SECTIONS),
        &input.appliances,
        Meters(0.0),
    );
    let subtotals = base_subtotals(&quantities, &PRICES);
    let exchange_rate = input.currency.exchange_rate();

    PreviewSummary {
        project_name: input.project_name.clone(),
        client_name: input.client_name.clone(),
        quantities,
        subtotals,
        currency: input.currency,
        exchange_rate,
        total_cost: subtotals.total() * exchange_rate,
    }
}

fn sections_or(value: u32, fallback: u32) -> u32 {
    if value <= MAX_SECTIONS {
        value
    } else {
        fallback
    }
}

fn positive_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}
