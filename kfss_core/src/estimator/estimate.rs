//! # Committed Estimate
//!
//! Validates an [`EstimatorInput`], prices it with the safety factor applied,
//! converts the total into the quote currency and stamps the result with a
//! fresh id and UTC timestamp.
//!
//! ## Example
//!
//! ```rust
//! use kfss_core::estimator::{Estimator, EstimatorInput, ProjectInfo};
//!
//! let input = EstimatorInput::new(ProjectInfo::new("Main Kitchen", "Bistro Ltd"), 3.0, 1.2, 2, 1);
//! let result = Estimator::new().compute(&input).unwrap();
//!
//! assert_eq!(result.nozzles.total, 3);
//! assert_eq!(result.cylinders_required, 1);
//! assert!((result.total_cost - 5654.0).abs() < 1e-6);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{ApplianceSpec, MAX_APPLIANCE_NOZZLES, MIN_APPLIANCE_NOZZLES};
use crate::errors::{CalcError, CalcResult, FieldIssue};
use crate::estimator::ids::IdGenerator;
use crate::estimator::{
    base_subtotals, bill_of_quantities, NozzleBreakdown, Quantities, Subtotals, MAX_SECTIONS,
};
use crate::pricing::{CostCategory, Currency, CylinderSize, PriceTable, PRICES};
use crate::units::{Kilograms, Meters, SquareMeters};

/// Default safety factor (%)
pub const DEFAULT_SAFETY_FACTOR_PERCENT: f64 = 10.0;

/// Default expert duct run (m)
pub const DEFAULT_DUCT_LENGTH_M: f64 = 5.0;

/// Default system pressure rating
pub const DEFAULT_PRESSURE_RATING: u32 = 100;

/// Project identification printed on results and quotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    pub client: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub currency: Currency,
}

impl ProjectInfo {
    pub fn new(name: impl Into<String>, client: impl Into<String>) -> Self {
        ProjectInfo {
            name: name.into(),
            client: client.into(),
            location: String::new(),
            currency: Currency::USD,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }
}

/// Parameters exposed in expert mode.
///
/// Only `duct_length_m` depends on expert mode being active; the safety factor
/// applies to every committed estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpertParameters {
    pub hood_material: String,
    pub duct_length_m: f64,
    pub nozzle_type: String,
    pub pipe_material: String,
    pub safety_factor_percent: f64,
    pub pressure_rating: u32,
    pub notes: String,
}

impl Default for ExpertParameters {
    fn default() -> Self {
        ExpertParameters {
            hood_material: "stainless".to_string(),
            duct_length_m: DEFAULT_DUCT_LENGTH_M,
            nozzle_type: "standard".to_string(),
            pipe_material: "galvanized".to_string(),
            safety_factor_percent: DEFAULT_SAFETY_FACTOR_PERCENT,
            pressure_rating: DEFAULT_PRESSURE_RATING,
            notes: String::new(),
        }
    }
}

impl ExpertParameters {
    /// `1 + safety_factor_percent / 100`
    pub fn safety_multiplier(&self) -> f64 {
        1.0 + self.safety_factor_percent / 100.0
    }
}

/// Input parameters for a committed estimate.
///
/// ## JSON Example
///
/// ```json
/// {
///   "project": { "name": "Main Kitchen", "client": "Bistro Ltd", "location": "", "currency": "USD" },
///   "hood_length_m": 3.0,
///   "hood_depth_m": 1.2,
///   "plenum_sections": 2,
///   "duct_sections": 1,
///   "appliances": [],
///   "expert_mode": false,
///   "expert": { "safety_factor_percent": 10.0 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorInput {
    pub project: ProjectInfo,
    pub hood_length_m: f64,
    pub hood_depth_m: f64,
    pub plenum_sections: u32,
    pub duct_sections: u32,
    #[serde(default)]
    pub appliances: Vec<ApplianceSpec>,
    #[serde(default)]
    pub expert_mode: bool,
    #[serde(default)]
    pub expert: ExpertParameters,
}

impl EstimatorInput {
    pub fn new(
        project: ProjectInfo,
        hood_length_m: f64,
        hood_depth_m: f64,
        plenum_sections: u32,
        duct_sections: u32,
    ) -> Self {
        EstimatorInput {
            project,
            hood_length_m,
            hood_depth_m,
            plenum_sections,
            duct_sections,
            appliances: Vec::new(),
            expert_mode: false,
            expert: ExpertParameters::default(),
        }
    }

    pub fn with_appliance(mut self, appliance: ApplianceSpec) -> Self {
        self.appliances.push(appliance);
        self
    }

    pub fn with_expert(mut self, expert: ExpertParameters) -> Self {
        self.expert_mode = true;
        self.expert = expert;
        self
    }

    pub fn currency(&self) -> Currency {
        self.project.currency
    }

    /// Duct run added to the piping; zero unless expert mode is on
    pub fn extra_duct(&self) -> Meters {
        if self.expert_mode {
            Meters(self.expert.duct_length_m)
        } else {
            Meters(0.0)
        }
    }

    /// Check every boundary rule and report all offending fields at once.
    pub fn validate(&self) -> CalcResult<()> {
        let mut issues = Vec::new();

        if self.project.name.trim().is_empty() {
            issues.push(FieldIssue::new("project_name", "Project name is required"));
        }
        if self.project.client.trim().is_empty() {
            issues.push(FieldIssue::new("client_name", "Client name is required"));
        }
        if !(self.hood_length_m.is_finite() && self.hood_length_m > 0.0) {
            issues.push(FieldIssue::new("hood_length_m", "Hood length must be positive"));
        }
        if !(self.hood_depth_m.is_finite() && self.hood_depth_m > 0.0) {
            issues.push(FieldIssue::new("hood_depth_m", "Hood depth must be positive"));
        }
        if self.plenum_sections > MAX_SECTIONS {
            issues.push(FieldIssue::new(
                "plenum_sections",
                format!("At most {} plenum sections are supported", MAX_SECTIONS),
            ));
        }
        if self.duct_sections > MAX_SECTIONS {
            issues.push(FieldIssue::new(
                "duct_sections",
                format!("At most {} duct sections are supported", MAX_SECTIONS),
            ));
        }
        for appliance in &self.appliances {
            if !(MIN_APPLIANCE_NOZZLES..=MAX_APPLIANCE_NOZZLES).contains(&appliance.nozzle_count) {
                issues.push(FieldIssue::new(
                    format!("appliances.{}", appliance.id),
                    "Nozzle count must be between 1 and 5",
                ));
            }
        }
        if !(self.expert.safety_factor_percent.is_finite() && self.expert.safety_factor_percent >= 0.0) {
            issues.push(FieldIssue::new("safety_factor_percent", "Safety factor cannot be negative"));
        }
        if self.expert_mode && !(self.expert.duct_length_m.is_finite() && self.expert.duct_length_m >= 0.0) {
            issues.push(FieldIssue::new("duct_length_m", "Duct length cannot be negative"));
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(CalcError::validation(issues))
        }
    }
}

/// Priced bill for an input, without id or timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedBill {
    pub quantities: Quantities,
    /// Base currency, safety factor applied
    pub subtotals: Subtotals,
    pub exchange_rate: f64,
    /// Quote currency
    pub total_cost: f64,
}

/// Price an input against a table. Does not validate.
pub fn price_bill(input: &EstimatorInput, prices: &PriceTable) -> PricedBill {
    let quantities = bill_of_quantities(
        Meters(input.hood_length_m),
        Meters(input.hood_depth_m),
        input.plenum_sections,
        input.duct_sections,
        &input.appliances,
        input.extra_duct(),
    );
    let subtotals = base_subtotals(&quantities, prices).scaled(input.expert.safety_multiplier());
    let exchange_rate = input.currency().exchange_rate();

    PricedBill {
        quantities,
        subtotals,
        exchange_rate,
        total_cost: subtotals.total() * exchange_rate,
    }
}

impl PricedBill {
    /// Every quantity and amount must be a finite number before it is stored.
    fn check_finite(&self) -> CalcResult<()> {
        let q = &self.quantities;
        let mut issues = Vec::new();

        if !q.hood_area.value().is_finite() {
            issues.push(FieldIssue::new("hood_area_m2", "Hood length times depth is out of range"));
        }
        if !q.piping_length.value().is_finite() {
            issues.push(FieldIssue::new("piping_length_m", "Piping length is out of range"));
        }
        let amounts_finite = self.subtotals.iter().all(|(_, amount)| amount.is_finite());
        if !(amounts_finite && self.total_cost.is_finite()) {
            issues.push(FieldIssue::new("total_cost", "Total cost is out of range"));
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(CalcError::validation(issues))
        }
    }
}

/// A committed estimate, as stored in the history.
///
/// `subtotals` stay in the base currency; multiply by `exchange_rate` to show
/// them in the quote currency. `total_cost` is already converted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimationResult {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub project: ProjectInfo,
    pub configuration: EstimatorInput,
    pub hood_area_m2: SquareMeters,
    pub nozzles: NozzleBreakdown,
    pub cylinders_required: u32,
    pub cylinder_size: CylinderSize,
    pub agent_weight_kg: Kilograms,
    pub piping_length_m: Meters,
    pub subtotals: Subtotals,
    pub total_cost: f64,
    pub exchange_rate: f64,
}

impl EstimationResult {
    pub fn currency(&self) -> Currency {
        self.project.currency
    }

    /// Base-currency amount expressed in the quote currency
    pub fn converted(&self, amount: f64) -> f64 {
        amount * self.exchange_rate
    }

    /// A subtotal in the quote currency
    pub fn converted_subtotal(&self, category: CostCategory) -> f64 {
        self.converted(self.subtotals.get(category))
    }

    pub fn safety_factor_percent(&self) -> f64 {
        self.configuration.expert.safety_factor_percent
    }

    /// Quote-currency total before the safety factor was applied
    pub fn total_before_safety(&self) -> f64 {
        self.total_cost / self.configuration.expert.safety_multiplier()
    }

    /// Quote-currency amount the safety factor added
    pub fn safety_amount(&self) -> f64 {
        self.total_cost - self.total_before_safety()
    }
}

/// Computes committed estimates and hands out their ids.
#[derive(Debug)]
pub struct Estimator {
    prices: PriceTable,
    ids: IdGenerator,
}

impl Default for Estimator {
    fn default() -> Self {
        Estimator::new()
    }
}

impl Estimator {
    pub fn new() -> Self {
        Estimator {
            prices: PRICES,
            ids: IdGenerator::new(),
        }
    }

    pub fn with_ids(ids: IdGenerator) -> Self {
        Estimator { prices: PRICES, ids }
    }

    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    pub fn prices(&self) -> &PriceTable {
        &self.prices
    }

    /// Validate and price an input.
    ///
    /// # Returns
    ///
    /// * `Ok(EstimationResult)` - priced result with a fresh id
    /// * `Err(CalcError::Validation)` - naming every offending field, or the
    ///   result value that came out non-finite
    pub fn compute(&self, input: &EstimatorInput) -> CalcResult<EstimationResult> {
        input.validate()?;

        let bill = price_bill(input, &self.prices);
        bill.check_finite()?;
        let q = bill.quantities;

        Ok(EstimationResult {
            id: self.ids.next_id(),
            timestamp: Utc::now(),
            project: input.project.clone(),
            configuration: input.clone(),
            hood_area_m2: q.hood_area,
            nozzles: q.nozzles,
            cylinders_required: q.cylinders_required,
            cylinder_size: q.cylinder_size,
            agent_weight_kg: q.agent_weight,
            piping_length_m: q.piping_length,
            subtotals: bill.subtotals,
            total_cost: bill.total_cost,
            exchange_rate: bill.exchange_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::find_standard;

    fn reference_input() -> EstimatorInput {
        EstimatorInput::new(ProjectInfo::new("Main Kitchen", "Bistro Ltd"), 3.0, 1.2, 2, 1)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_reference_estimate() {
        let result = Estimator::new().compute(&reference_input()).unwrap();

        assert_eq!(result.nozzles.total, 3);
        assert_eq!(result.cylinders_required, 1);
        assert!(close(result.agent_weight_kg.value(), 5.7));
        assert!(close(result.piping_length_m.value(), 11.0));
        assert!(close(result.hood_area_m2.value(), 3.6));

        let s = &result.subtotals;
        assert!(close(s.nozzles, 280.5));
        assert!(close(s.cylinders, 1320.0));
        assert!(close(s.piping, 423.5));
        assert!(close(s.hood_agent_tank, 1980.0));
        assert!(close(s.manual_release, 275.0));
        assert!(close(s.installation_labor, 935.0));
        assert!(close(s.commissioning, 440.0));
        assert!(close(s.appliances, 0.0));
        assert!(close(result.total_cost, 5654.0));
        assert_eq!(result.exchange_rate, 1.0);
    }

    #[test]
    fn test_two_cylinders_priced_at_ten_kg() {
        let input = EstimatorInput::new(ProjectInfo::new("P", "C"), 3.0, 1.2, 4, 3);
        let result = Estimator::new().compute(&input).unwrap();
        assert_eq!(result.cylinders_required, 2);
        assert_eq!(result.cylinder_size, CylinderSize::TenKg);
        assert!(close(result.subtotals.cylinders, 2.0 * 1900.0 * 1.1));
    }

    #[test]
    fn test_safety_factor_scales_appliances_too() {
        let input = reference_input().with_appliance(find_standard("wok").unwrap().clone());
        let result = Estimator::new().compute(&input).unwrap();
        assert!(close(result.subtotals.appliances, 1100.0 * 1.1));
    }

    #[test]
    fn test_zero_safety_factor() {
        let mut input = reference_input();
        input.expert.safety_factor_percent = 0.0;
        let result = Estimator::new().compute(&input).unwrap();
        assert!(close(result.total_cost, 5140.0));
    }

    #[test]
    fn test_currency_conversion_applies_once() {
        let input = EstimatorInput {
            project: ProjectInfo::new("P", "C").with_currency(Currency::INR),
            ..reference_input()
        };
        let result = Estimator::new().compute(&input).unwrap();
        assert_eq!(result.exchange_rate, 83.0);
        assert!(close(result.total_cost, 5654.0 * 83.0));
        // subtotals stay in base currency
        assert!(close(result.subtotals.nozzles, 280.5));

        let redisplayed: f64 = result
            .subtotals
            .iter()
            .map(|(category, _)| result.converted_subtotal(category))
            .sum();
        assert!((redisplayed - result.total_cost).abs() < 1e-6);
    }

    #[test]
    fn test_expert_duct_only_when_expert_mode() {
        let mut input = reference_input();
        input.expert.duct_length_m = 8.0;
        let plain = Estimator::new().compute(&input).unwrap();
        assert!(close(plain.piping_length_m.value(), 11.0));

        input.expert_mode = true;
        let expert = Estimator::new().compute(&input).unwrap();
        assert!(close(expert.piping_length_m.value(), 19.0));
    }

    #[test]
    fn test_validation_collects_all_fields() {
        let input = EstimatorInput::new(ProjectInfo::new("  ", ""), 0.0, -1.0, 2, 1);
        let err = Estimator::new().compute(&input).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert_eq!(
            err.fields(),
            vec!["project_name", "client_name", "hood_length_m", "hood_depth_m"]
        );
    }

    #[test]
    fn test_validation_rejects_bad_appliance_and_nan() {
        let mut bad = find_standard("fryer").unwrap().clone();
        bad.nozzle_count = 9;
        let mut input = reference_input().with_appliance(bad);
        input.hood_depth_m = f64::NAN;
        let err = input.validate().unwrap_err();
        assert_eq!(err.fields(), vec!["hood_depth_m", "appliances.fryer"]);
    }

    #[test]
    fn test_validation_caps_section_counts() {
        let input = EstimatorInput::new(ProjectInfo::new("P", "C"), 3.0, 1.2, u32::MAX, MAX_SECTIONS + 1);
        let err = Estimator::new().compute(&input).unwrap_err();
        assert_eq!(err.fields(), vec!["plenum_sections", "duct_sections"]);

        let at_limit = EstimatorInput::new(ProjectInfo::new("P", "C"), 3.0, 1.2, MAX_SECTIONS, MAX_SECTIONS);
        let result = Estimator::new().compute(&at_limit).unwrap();
        assert_eq!(result.nozzles.total, 2 * MAX_SECTIONS);
    }

    #[test]
    fn test_overflowing_results_rejected() {
        let estimator = Estimator::new();
        let before = estimator.compute(&reference_input()).unwrap().id;

        let huge_hood = EstimatorInput::new(ProjectInfo::new("P", "C"), 1e200, 1e200, 2, 1);
        let err = estimator.compute(&huge_hood).unwrap_err();
        assert_eq!(err.fields(), vec!["hood_area_m2"]);

        let mut huge_safety = reference_input();
        huge_safety.expert.safety_factor_percent = 1e308;
        let err = estimator.compute(&huge_safety).unwrap_err();
        assert_eq!(err.fields(), vec!["total_cost"]);

        let mut long_duct = reference_input();
        long_duct.expert_mode = true;
        long_duct.expert.duct_length_m = f64::MAX;
        let err = estimator.compute(&long_duct).unwrap_err();
        assert!(err.fields().contains(&"total_cost"));

        let after = estimator.compute(&reference_input()).unwrap().id;
        assert!(after > before);
    }

    #[test]
    fn test_safety_breakdown() {
        let result = Estimator::new().compute(&reference_input()).unwrap();
        assert!(close(result.total_before_safety(), 5140.0));
        assert!(close(result.safety_amount(), 514.0));
    }

    #[test]
    fn test_ids_unique_in_rapid_succession() {
        let estimator = Estimator::new();
        let input = reference_input();
        let a = estimator.compute(&input).unwrap();
        let b = estimator.compute(&input).unwrap();
        assert!(b.id > a.id);
    }

    #[test]
    fn test_result_serialization() {
        let result = Estimator::new().compute(&reference_input()).unwrap();
        let json = serde_json::to_string_pretty(&result).unwrap();
        assert!(json.contains("\"hood_agent_tank\""));
        assert!(json.contains("\"5kg\""));
        let roundtrip: EstimationResult = serde_json::from_str(&json).unwrap();
        assert_eq!(roundtrip.id, result.id);
        assert_eq!(roundtrip.timestamp, result.timestamp);
        assert_eq!(roundtrip.configuration.project, result.project);
        assert_eq!(roundtrip.nozzles, result.nozzles);
        assert!(close(roundtrip.total_cost, result.total_cost));
    }
}
