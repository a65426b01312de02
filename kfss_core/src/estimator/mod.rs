//! # Estimator
//!
//! Turns hood geometry, section counts and selected appliances into a bill of
//! quantities and an itemized price. Each entry point follows the pattern:
//!
//! - `*Input` - Input parameters (JSON-serializable)
//! - `*Result` / `*Summary` - Output (JSON-serializable)
//! - a pure function from one to the other
//!
//! ## Available Calculations
//!
//! - [`estimate`] - Committed estimate: validated, safety factor applied, gets an id
//! - [`preview`] - Live summary: relaxed defaults, no safety factor, never fails
//!
//! Both share [`bill_of_quantities`] and [`base_subtotals`].

pub mod estimate;
pub mod ids;
pub mod preview;

use serde::{Deserialize, Serialize};

use crate::catalog::ApplianceSpec;
use crate::pricing::{
    CostCategory, CylinderSize, PriceTable, AGENT_KG_PER_CYLINDER, MAIN_PIPING_RUN_M,
    NOZZLES_PER_CYLINDER, PIPING_PER_NOZZLE_M,
};
use crate::units::{Kilograms, Meters, SquareMeters};

// Re-export commonly used types
pub use estimate::{EstimationResult, Estimator, EstimatorInput, ExpertParameters, ProjectInfo};
pub use ids::IdGenerator;
pub use preview::{preview, PreviewInput, PreviewSummary};

/// Most plenum or duct sections accepted for one hood
pub const MAX_SECTIONS: u32 = 1_000;

/// Nozzle count per coverage zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NozzleBreakdown {
    pub plenum: u32,
    pub duct: u32,
    pub appliances: u32,
    pub total: u32,
}

/// Physical quantities of a system, before any pricing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantities {
    pub hood_area: SquareMeters,
    pub nozzles: NozzleBreakdown,
    pub cylinders_required: u32,
    pub cylinder_size: CylinderSize,
    pub agent_weight: Kilograms,
    pub piping_length: Meters,
    /// Sum of selected appliance prices (USD)
    pub appliance_cost: f64,
}

/// Count nozzles, cylinders, agent and piping for a hood.
///
/// `extra_duct` is the expert-supplied duct run; pass zero when expert mode is off.
///
/// ```rust
/// use kfss_core::estimator::bill_of_quantities;
/// use kfss_core::units::Meters;
///
/// let q = bill_of_quantities(Meters(3.0), Meters(1.2), 2, 1, &[], Meters(0.0));
/// assert_eq!(q.nozzles.total, 3);
/// assert_eq!(q.cylinders_required, 1);
/// assert_eq!(q.piping_length, Meters(11.0));
/// ```
pub fn bill_of_quantities(
    hood_length: Meters,
    hood_depth: Meters,
    plenum_sections: u32,
    duct_sections: u32,
    appliances: &[ApplianceSpec],
    extra_duct: Meters,
) -> Quantities {
    let appliance_nozzles = appliances
        .iter()
        .fold(0u32, |acc, a| acc.saturating_add(a.nozzle_count));
    let appliance_cost: f64 = appliances.iter().map(|a| a.price).sum();

    let total = plenum_sections
        .saturating_add(duct_sections)
        .saturating_add(appliance_nozzles);
    let cylinders_required = total.div_ceil(NOZZLES_PER_CYLINDER);

    let piping_length = Meters(f64::from(total) * PIPING_PER_NOZZLE_M + MAIN_PIPING_RUN_M) + extra_duct;

    Quantities {
        hood_area: hood_length * hood_depth,
        nozzles: NozzleBreakdown {
            plenum: plenum_sections,
            duct: duct_sections,
            appliances: appliance_nozzles,
            total,
        },
        cylinders_required,
        cylinder_size: CylinderSize::for_count(cylinders_required),
        agent_weight: Kilograms(f64::from(cylinders_required) * AGENT_KG_PER_CYLINDER),
        piping_length,
        appliance_cost,
    }
}

/// Amount per cost category.
///
/// Fields are in [`CostCategory::ALL`] order; use [`Subtotals::iter`] to walk
/// them in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Subtotals {
    pub nozzles: f64,
    pub cylinders: f64,
    pub piping: f64,
    pub hood_agent_tank: f64,
    pub manual_release: f64,
    pub installation_labor: f64,
    pub commissioning: f64,
    pub appliances: f64,
}

impl Subtotals {
    pub fn get(&self, category: CostCategory) -> f64 {
        match category {
            CostCategory::Nozzles => self.nozzles,
            CostCategory::Cylinders => self.cylinders,
            CostCategory::Piping => self.piping,
            CostCategory::HoodAgentTank => self.hood_agent_tank,
            CostCategory::ManualRelease => self.manual_release,
            CostCategory::InstallationLabor => self.installation_labor,
            CostCategory::Commissioning => self.commissioning,
            CostCategory::Appliances => self.appliances,
        }
    }

    fn slot_mut(&mut self, category: CostCategory) -> &mut f64 {
        match category {
            CostCategory::Nozzles => &mut self.nozzles,
            CostCategory::Cylinders => &mut self.cylinders,
            CostCategory::Piping => &mut self.piping,
            CostCategory::HoodAgentTank => &mut self.hood_agent_tank,
            CostCategory::ManualRelease => &mut self.manual_release,
            CostCategory::InstallationLabor => &mut self.installation_labor,
            CostCategory::Commissioning => &mut self.commissioning,
            CostCategory::Appliances => &mut self.appliances,
        }
    }

    pub fn set(&mut self, category: CostCategory, amount: f64) {
        *self.slot_mut(category) = amount;
    }

    /// (category, amount) pairs in presentation order
    pub fn iter(&self) -> impl Iterator<Item = (CostCategory, f64)> + '_ {
        CostCategory::ALL.into_iter().map(move |c| (c, self.get(c)))
    }

    pub fn total(&self) -> f64 {
        self.iter().map(|(_, amount)| amount).sum()
    }

    /// Every category multiplied by the same factor
    pub fn scaled(&self, factor: f64) -> Subtotals {
        let mut out = *self;
        for category in CostCategory::ALL {
            *out.slot_mut(category) *= factor;
        }
        out
    }
}

/// Price each category from the quantities, before safety factor or currency.
pub fn base_subtotals(quantities: &Quantities, prices: &PriceTable) -> Subtotals {
    let mut subtotals = Subtotals {
        nozzles: f64::from(quantities.nozzles.total) * prices.nozzle,
        cylinders: f64::from(quantities.cylinders_required)
            * prices.cylinder_unit_price(quantities.cylinders_required),
        piping: quantities.piping_length.value() * prices.piping_per_meter,
        appliances: quantities.appliance_cost,
        ..Subtotals::default()
    };
    for category in CostCategory::ALL {
        if let Some(price) = category.fixed_price(prices) {
            subtotals.set(category, price);
        }
    }
    subtotals
}
