//! # Form Input
//!
//! Raw, user-typed field values and the rules for turning them into estimator
//! inputs. A committed estimate reads the form strictly; the live preview reads
//! it leniently and falls back to documented defaults.
//!
//! ```rust
//! use kfss_core::form::{FormField, FormValues};
//!
//! let form = FormValues::new()
//!     .with(FormField::ProjectName, "Main Kitchen")
//!     .with(FormField::ClientName, "Bistro Ltd")
//!     .with(FormField::HoodLength, "4.5");
//!
//! let preview = kfss_core::form::preview_input(&form, &[]);
//! assert_eq!(preview.hood_length_m, 4.5);
//! assert_eq!(preview.hood_depth_m, 1.2);
//! ```

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::catalog::ApplianceSpec;
use crate::errors::{CalcError, CalcResult, FieldIssue};
use crate::estimator::preview::PreviewInput;
use crate::estimator::{EstimationResult, EstimatorInput, ExpertParameters, ProjectInfo, MAX_SECTIONS};
use crate::pricing::Currency;

/// Every field of the estimate form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormField {
    ProjectName,
    ClientName,
    ProjectLocation,
    HoodLength,
    HoodDepth,
    PlenumSections,
    DuctSections,
    Currency,
    HoodMaterial,
    DuctLength,
    NozzleType,
    PipeMaterial,
    SafetyFactor,
    PressureRating,
    Notes,
}

impl FormField {
    pub const ALL: [FormField; 15] = [
        FormField::ProjectName,
        FormField::ClientName,
        FormField::ProjectLocation,
        FormField::HoodLength,
        FormField::HoodDepth,
        FormField::PlenumSections,
        FormField::DuctSections,
        FormField::Currency,
        FormField::HoodMaterial,
        FormField::DuctLength,
        FormField::NozzleType,
        FormField::PipeMaterial,
        FormField::SafetyFactor,
        FormField::PressureRating,
        FormField::Notes,
    ];

    /// Documented value used when the field is empty or absent
    pub fn default_value(self) -> Option<&'static str> {
        match self {
            FormField::HoodLength => Some("3.0"),
            FormField::HoodDepth => Some("1.2"),
            FormField::PlenumSections => Some("2"),
            FormField::DuctSections => Some("1"),
            FormField::Currency => Some("USD"),
            FormField::HoodMaterial => Some("stainless"),
            FormField::DuctLength => Some("5.0"),
            FormField::NozzleType => Some("standard"),
            FormField::PipeMaterial => Some("galvanized"),
            FormField::SafetyFactor => Some("10"),
            FormField::PressureRating => Some("100"),
            _ => None,
        }
    }

    /// Value the form is reset to
    pub fn reset_value(self) -> &'static str {
        match self {
            FormField::ProjectName => "Commercial Kitchen Design",
            FormField::ClientName => "Restaurant Corporation",
            other => other.default_value().unwrap_or(""),
        }
    }
}

/// Source of current form values.
pub trait FormInputProvider {
    /// Raw value as typed, if any
    fn value(&self, field: FormField) -> Option<String>;

    /// Trimmed value, `None` when absent or blank
    fn text(&self, field: FormField) -> Option<String> {
        self.value(field)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// In-memory form state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormValues {
    values: BTreeMap<FormField, String>,
}

impl FormValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Form as it looks after a reset
    pub fn reset_defaults() -> Self {
        let mut form = FormValues::new();
        for field in FormField::ALL {
            form.set(field, field.reset_value());
        }
        form
    }

    pub fn with(mut self, field: FormField, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: FormField, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    pub fn clear(&mut self, field: FormField) {
        self.values.remove(&field);
    }

    /// Repopulate the form from a stored estimate
    pub fn from_result(result: &EstimationResult) -> Self {
        let input = &result.configuration;
        let expert = &input.expert;
        FormValues::new()
            .with(FormField::ProjectName, result.project.name.clone())
            .with(FormField::ClientName, result.project.client.clone())
            .with(FormField::ProjectLocation, result.project.location.clone())
            .with(FormField::Currency, result.project.currency.code())
            .with(FormField::HoodLength, input.hood_length_m.to_string())
            .with(FormField::HoodDepth, input.hood_depth_m.to_string())
            .with(FormField::PlenumSections, input.plenum_sections.to_string())
            .with(FormField::DuctSections, input.duct_sections.to_string())
            .with(FormField::HoodMaterial, expert.hood_material.clone())
            .with(FormField::DuctLength, expert.duct_length_m.to_string())
            .with(FormField::NozzleType, expert.nozzle_type.clone())
            .with(FormField::PipeMaterial, expert.pipe_material.clone())
            .with(FormField::SafetyFactor, expert.safety_factor_percent.to_string())
            .with(FormField::PressureRating, expert.pressure_rating.to_string())
            .with(FormField::Notes, expert.notes.clone())
    }
}

impl FormInputProvider for FormValues {
    fn value(&self, field: FormField) -> Option<String> {
        self.values.get(&field).cloned()
    }
}

/// Parse a field, falling back to its documented default when blank or unusable.
fn lenient<T: FromStr>(form: &impl FormInputProvider, field: FormField) -> Option<T> {
    form.text(field)
        .and_then(|v| v.parse().ok())
        .or_else(|| field.default_value().and_then(|d| d.parse().ok()))
}

fn lenient_sections(form: &impl FormInputProvider, field: FormField) -> Option<u32> {
    lenient(form, field).filter(|n| *n <= MAX_SECTIONS)
}

fn lenient_positive(form: &impl FormInputProvider, field: FormField, fallback: f64) -> f64 {
    form.text(field)
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
        .unwrap_or(fallback)
}

fn lenient_string(form: &impl FormInputProvider, field: FormField) -> String {
    form.text(field)
        .or_else(|| field.default_value().map(str::to_string))
        .unwrap_or_default()
}

/// Strict section count: blank is zero, anything else must be a whole number >= 0.
fn strict_sections(form: &impl FormInputProvider, field: FormField, name: &str, issues: &mut Vec<FieldIssue>) -> u32 {
    match form.text(field) {
        None => 0,
        Some(v) => v.parse::<u32>().unwrap_or_else(|_| {
            issues.push(FieldIssue::new(name, format!("'{}' is not a whole number of sections", v)));
            0
        }),
    }
}

/// Strict dimension: blank is zero so the positivity check reports it.
fn strict_dimension(form: &impl FormInputProvider, field: FormField) -> f64 {
    form.text(field)
        .map(|v| v.parse::<f64>().unwrap_or(f64::NAN))
        .unwrap_or(0.0)
}

/// Build a committed-estimate input from the form and the current selection.
///
/// Reports every unusable field in one `CalcError::Validation`.
pub fn estimator_input(
    form: &impl FormInputProvider,
    appliances: &[ApplianceSpec],
    expert_mode: bool,
) -> CalcResult<EstimatorInput> {
    let mut issues = Vec::new();

    let currency = match form.text(FormField::Currency) {
        None => Currency::USD,
        Some(code) => code.parse().unwrap_or_else(|_| {
            issues.push(FieldIssue::new("currency", format!("Unsupported currency '{}'", code)));
            Currency::USD
        }),
    };

    let project = ProjectInfo {
        name: form.text(FormField::ProjectName).unwrap_or_default(),
        client: form.text(FormField::ClientName).unwrap_or_default(),
        location: form.text(FormField::ProjectLocation).unwrap_or_default(),
        currency,
    };

    let defaults = ExpertParameters::default();
    let expert = ExpertParameters {
        hood_material: lenient_string(form, FormField::HoodMaterial),
        duct_length_m: lenient(form, FormField::DuctLength).unwrap_or(defaults.duct_length_m),
        nozzle_type: lenient_string(form, FormField::NozzleType),
        pipe_material: lenient_string(form, FormField::PipeMaterial),
        safety_factor_percent: lenient(form, FormField::SafetyFactor).unwrap_or(defaults.safety_factor_percent),
        pressure_rating: lenient(form, FormField::PressureRating).unwrap_or(defaults.pressure_rating),
        notes: form.value(FormField::Notes).unwrap_or_default(),
    };

    let input = EstimatorInput {
        project,
        hood_length_m: strict_dimension(form, FormField::HoodLength),
        hood_depth_m: strict_dimension(form, FormField::HoodDepth),
        plenum_sections: strict_sections(form, FormField::PlenumSections, "plenum_sections", &mut issues),
        duct_sections: strict_sections(form, FormField::DuctSections, "duct_sections", &mut issues),
        appliances: appliances.to_vec(),
        expert_mode,
        expert,
    };

    match input.validate() {
        Ok(()) if issues.is_empty() => Ok(input),
        Ok(()) => Err(CalcError::validation(issues)),
        Err(CalcError::Validation { issues: found }) => {
            issues.extend(found);
            Err(CalcError::validation(issues))
        }
        Err(other) => Err(other),
    }
}

/// Build the live-preview input; never fails.
pub fn preview_input(form: &impl FormInputProvider, appliances: &[ApplianceSpec]) -> PreviewInput {
    let defaults = PreviewInput::default();
    PreviewInput {
        project_name: form.text(FormField::ProjectName).unwrap_or_default(),
        client_name: form.text(FormField::ClientName).unwrap_or_default(),
        hood_length_m: lenient_positive(form, FormField::HoodLength, defaults.hood_length_m),
        hood_depth_m: lenient_positive(form, FormField::HoodDepth, defaults.hood_depth_m),
        plenum_sections: lenient_sections(form, FormField::PlenumSections).unwrap_or(defaults.plenum_sections),
        duct_sections: lenient_sections(form, FormField::DuctSections).unwrap_or(defaults.duct_sections),
        currency: lenient(form, FormField::Currency).unwrap_or(defaults.currency),
        appliances: appliances.to_vec(),
    }
}
