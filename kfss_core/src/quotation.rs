//! # Quotation
//!
//! A customer-facing quotation derived from a stored [`EstimationResult`].
//!
//! Line items are priced before the safety factor: unit prices come from the
//! price table converted with the result's exchange rate, and each line total is
//! quantity times unit price. The lines therefore add up to the pre-safety
//! subtotal; the safety-factor line and the grand total use the percentage
//! recorded with the estimate.
//!
//! ```text
//! Quote No: Q-2026-10-482913
//! Wet Chemical Cylinder System (5kg)   1     $1,200.00    $1,200.00
//! Discharge Nozzles (various types)    3        $85.00      $255.00
//! ...
//! SUBTOTAL                                               $5,140.00
//! Safety Factor (10%)                                      $514.00
//! TOTAL QUOTATION AMOUNT                                 $5,654.00
//! ```

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::{CompanyInfo, Settings};
use crate::estimator::EstimationResult;
use crate::pricing::{CylinderSize, Currency, PRICES};
use crate::report::format_money;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotationLine {
    pub description: String,
    pub quantity: f64,
    /// Quantity unit, e.g. "m" for piping; `None` for counted items
    pub unit: Option<String>,
    pub unit_price: f64,
    pub total: f64,
}

impl QuotationLine {
    fn counted(description: impl Into<String>, quantity: u32, unit_price: f64) -> Self {
        let quantity = f64::from(quantity);
        QuotationLine {
            description: description.into(),
            quantity,
            unit: None,
            unit_price,
            total: quantity * unit_price,
        }
    }

    /// Quantity as shown, rounded to whole units
    pub fn quantity_text(&self) -> String {
        match &self.unit {
            Some(unit) => format!("{} {}", self.quantity.round(), unit),
            None => format!("{}", self.quantity.round()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
    pub quote_number: String,
    pub issued: NaiveDate,
    pub valid_until: NaiveDate,
    pub validity_days: u32,
    pub currency: Currency,
    pub company: CompanyInfo,
    pub prepared_by: String,
    pub client: String,
    pub address: String,
    pub project_name: String,
    pub scope: Vec<String>,
    /// System components, installation and commissioning
    pub lines: Vec<QuotationLine>,
    /// One line per protected appliance
    pub appliance_lines: Vec<QuotationLine>,
    pub subtotal: f64,
    pub safety_factor_percent: f64,
    pub safety_amount: f64,
    pub grand_total: f64,
    pub terms: Vec<String>,
}

/// `Q-YYYY-MM-<last six digits of the id>`, dated by the calculation
pub fn quote_number(result: &EstimationResult) -> String {
    let id = result.id.to_string();
    let tail = &id[id.len().saturating_sub(6)..];
    format!(
        "Q-{}-{:02}-{}",
        result.timestamp.year(),
        result.timestamp.month(),
        tail
    )
}

impl Quotation {
    /// Build the quotation for `result`, issued on `today`.
    pub fn from_result(result: &EstimationResult, settings: &Settings, today: NaiveDate) -> Self {
        let rate = result.exchange_rate;
        let cylinders = result.cylinders_required;
        let cylinder_size = CylinderSize::for_count(cylinders);
        let piping_m = result.piping_length_m.value();
        let pipe_material = match result.configuration.expert.pipe_material.trim() {
            "" => "galvanized",
            other => other,
        };

        let scope = vec![
            format!(
                "Wet chemical suppression system with {} cylinder{}",
                cylinders,
                if cylinders > 1 { "s" } else { "" }
            ),
            format!(
                "{} discharge nozzles (plenum, duct, and appliance protection)",
                result.nozzles.total
            ),
            format!("Approximately {} meters of piping", piping_m.round()),
            "Manual release station and automatic detection system".to_string(),
            "Professional installation and commissioning".to_string(),
            "System testing and certification".to_string(),
            "Operator training on system use".to_string(),
        ];

        let lines = vec![
            QuotationLine::counted(
                format!("Wet Chemical Cylinder System ({})", cylinder_size.label()),
                cylinders,
                cylinder_size.unit_price(&PRICES) * rate,
            ),
            QuotationLine::counted(
                "Discharge Nozzles (various types)",
                result.nozzles.total,
                PRICES.nozzle * rate,
            ),
            QuotationLine {
                description: format!("Piping & Fittings ({})", pipe_material),
                quantity: piping_m,
                unit: Some("m".to_string()),
                unit_price: PRICES.piping_per_meter * rate,
                total: piping_m * PRICES.piping_per_meter * rate,
            },
            QuotationLine::counted("Hood & Agent Tank Assembly", 1, PRICES.hood_agent_tank * rate),
            QuotationLine::counted("Manual Release Station", 1, PRICES.manual_release * rate),
            QuotationLine::counted("Professional Installation", 1, PRICES.installation_labor * rate),
            QuotationLine::counted("System Commissioning & Testing", 1, PRICES.commissioning * rate),
        ];

        let appliance_lines = result
            .configuration
            .appliances
            .iter()
            .map(|appliance| QuotationLine {
                description: format!("{} Protection", appliance.name),
                quantity: f64::from(appliance.nozzle_count),
                unit: None,
                unit_price: appliance.price_per_nozzle() * rate,
                total: appliance.price * rate,
            })
            .collect();

        let validity_days = settings.quotation_validity_days;
        let valid_until = today
            .checked_add_days(Days::new(u64::from(validity_days)))
            .unwrap_or(NaiveDate::MAX);

        let currency = result.currency();
        let terms = vec![
            format!("This quotation is valid for {} days from the date issued.", validity_days),
            format!("Prices are in {} and include all standard components.", currency),
            "Installation timeline: 2-3 weeks from order confirmation.".to_string(),
            "Payment terms: 50% advance, 50% upon completion.".to_string(),
            "Warranty: 12 months on all parts and labor.".to_string(),
            "Annual maintenance contract available separately.".to_string(),
            "All work complies with NFPA 96 and NFPA 17A standards.".to_string(),
            "Any changes to scope may affect final price and timeline.".to_string(),
        ];

        Quotation {
            quote_number: quote_number(result),
            issued: result.timestamp.date_naive(),
            valid_until,
            validity_days,
            currency,
            company: settings.company.clone(),
            prepared_by: settings.prepared_by.clone(),
            client: result.project.client.clone(),
            address: if result.project.location.trim().is_empty() {
                "Address not specified".to_string()
            } else {
                result.project.location.clone()
            },
            project_name: result.project.name.clone(),
            scope,
            lines,
            appliance_lines,
            subtotal: result.total_before_safety(),
            safety_factor_percent: result.safety_factor_percent(),
            safety_amount: result.safety_amount(),
            grand_total: result.total_cost,
            terms,
        }
    }

    /// Every priced line, system items first
    pub fn all_lines(&self) -> impl Iterator<Item = &QuotationLine> + '_ {
        self.lines.iter().chain(self.appliance_lines.iter())
    }

    pub fn money(&self, amount: f64) -> String {
        format_money(amount, self.currency)
    }
}

/// Plain-text rendering for the terminal or a `.txt` file.
pub fn render_quotation_text(q: &Quotation) -> String {
    const WIDTH: usize = 78;
    let rule = "─".repeat(WIDTH);
    let row = |item: &str, qty: &str, unit: &str, total: &str| {
        format!("{:<38} {:>8} {:>14} {:>15}", item, qty, unit, total)
    };

    let mut out = vec![
        "QUOTATION".to_string(),
        format!("Quote No: {}", q.quote_number),
        String::new(),
        q.company.name.clone(),
    ];
    out.extend(q.company.address_lines.iter().cloned());
    out.push(format!("Phone: {}", q.company.phone));
    out.push(format!("Email: {}", q.company.email));
    out.push(format!("Website: {}", q.company.website));
    out.push(String::new());

    out.push("Quotation For:".to_string());
    out.push(format!("  {}", q.client));
    out.push(format!("  {}", q.address));
    out.push(format!("  Project: {}", q.project_name));
    out.push(String::new());
    out.push("Quotation Details:".to_string());
    out.push(format!("  Date:        {}", q.issued.format("%Y-%m-%d")));
    out.push(format!("  Valid Until: {}", q.valid_until.format("%Y-%m-%d")));
    out.push(format!("  Currency:    {}", q.currency));
    out.push(format!("  Prepared By: {}", q.prepared_by));
    out.push(String::new());

    out.push("Scope of Work".to_string());
    out.push(
        "Supply, installation, and commissioning of a complete wet chemical kitchen fire suppression system including:"
            .to_string(),
    );
    out.extend(q.scope.iter().map(|s| format!("  - {}", s)));
    out.push(String::new());

    out.push(row("Item Description", "Qty", "Unit Price", "Total"));
    out.push(rule.clone());
    for line in &q.lines {
        let unit_price = match &line.unit {
            Some(unit) => format!("{}/{}", q.money(line.unit_price), unit),
            None => q.money(line.unit_price),
        };
        out.push(row(&line.description, &line.quantity_text(), &unit_price, &q.money(line.total)));
    }
    if !q.appliance_lines.is_empty() {
        out.push("Appliance Protection".to_string());
        for line in &q.appliance_lines {
            out.push(row(
                &line.description,
                &line.quantity_text(),
                &q.money(line.unit_price),
                &q.money(line.total),
            ));
        }
    }
    out.push(rule.clone());
    out.push(row("SUBTOTAL", "", "", &q.money(q.subtotal)));
    out.push(row(
        &format!("Safety Factor ({}%)", q.safety_factor_percent),
        "",
        "",
        &q.money(q.safety_amount),
    ));
    out.push(row("TOTAL QUOTATION AMOUNT", "", "", &q.money(q.grand_total)));
    out.push(String::new());

    out.push("Terms & Conditions".to_string());
    out.extend(q.terms.iter().enumerate().map(|(i, t)| format!("  {}. {}", i + 1, t)));
    out.push(String::new());
    out.push(format!("For {}", q.company.name));
    out.push("______________________________    ______________________________".to_string());
    out.push("Authorized Signature              Client Signature".to_string());

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::find_standard;
    use crate::estimator::{Estimator, EstimatorInput, ExpertParameters, ProjectInfo};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn reference_result() -> EstimationResult {
        let input = EstimatorInput::new(ProjectInfo::new("Main Kitchen", "Bistro Ltd"), 3.0, 1.2, 2, 1);
        Estimator::new().compute(&input).unwrap()
    }

    #[test]
    fn test_quote_number() {
        let mut result = reference_result();
        result.id = 1_729_252_800_123;
        let number = quote_number(&result);
        let expected = format!(
            "Q-{}-{:02}-800123",
            result.timestamp.year(),
            result.timestamp.month()
        );
        assert_eq!(number, expected);

        result.id = 42;
        assert!(quote_number(&result).ends_with("-42"));
    }

    #[test]
    fn test_reference_totals() {
        let q = Quotation::from_result(&reference_result(), &Settings::default(), today());

        assert!((q.subtotal - 5140.0).abs() < 1e-6);
        assert!((q.safety_amount - 514.0).abs() < 1e-6);
        assert!((q.grand_total - 5654.0).abs() < 1e-6);
        assert!(q.appliance_lines.is_empty());

        let line_sum: f64 = q.all_lines().map(|l| l.total).sum();
        assert!((line_sum - q.subtotal).abs() < 1e-6);
    }

    #[test]
    fn test_validity_and_header() {
        let q = Quotation::from_result(&reference_result(), &Settings::default(), today());
        assert_eq!(q.valid_until, NaiveDate::from_ymd_opt(2026, 11, 17).unwrap());
        assert_eq!(q.address, "Address not specified");
        assert_eq!(q.prepared_by, "KFSS Calculator");
        assert_eq!(q.terms.len(), 8);
        assert!(q.terms[0].contains("30 days"));
        assert_eq!(q.scope[0], "Wet chemical suppression system with 1 cylinder");
        assert_eq!(q.scope[2], "Approximately 11 meters of piping");
    }

    #[test]
    fn test_lines_use_converted_unit_prices() {
        let input = EstimatorInput::new(
            ProjectInfo::new("Line", "Client").with_currency(Currency::EUR),
            3.0,
            1.2,
            4,
            2,
        )
        .with_appliance(find_standard("range").unwrap().clone());
        let result = Estimator::new().compute(&input).unwrap();
        let q = Quotation::from_result(&result, &Settings::default(), today());

        assert_eq!(q.lines[0].description, "Wet Chemical Cylinder System (10kg)");
        assert_eq!(q.lines[0].quantity, 2.0);
        assert!((q.lines[0].unit_price - 1900.0 * 0.92).abs() < 1e-9);
        assert_eq!(q.scope[0], "Wet chemical suppression system with 2 cylinders");

        let range = &q.appliance_lines[0];
        assert_eq!(range.description, "Cooking Range Protection");
        assert_eq!(range.quantity, 2.0);
        assert!((range.unit_price - 600.0 * 0.92).abs() < 1e-9);
        assert!((range.total - 1200.0 * 0.92).abs() < 1e-9);

        let line_sum: f64 = q.all_lines().map(|l| l.total).sum();
        assert!((line_sum - q.subtotal).abs() < 1e-6);
    }

    #[test]
    fn test_recorded_safety_factor() {
        let expert = ExpertParameters {
            safety_factor_percent: 15.0,
            duct_length_m: 0.0,
            ..ExpertParameters::default()
        };
        let input = EstimatorInput::new(ProjectInfo::new("P", "C"), 3.0, 1.2, 2, 1).with_expert(expert);
        let result = Estimator::new().compute(&input).unwrap();
        let q = Quotation::from_result(&result, &Settings::default(), today());

        assert!((q.subtotal - 5140.0).abs() < 1e-6);
        assert!((q.safety_amount - 771.0).abs() < 1e-6);
        assert_eq!(q.safety_factor_percent, 15.0);
    }

    #[test]
    fn test_render_text() {
        let settings = Settings {
            quotation_validity_days: 14,
            ..Settings::default()
        };
        let q = Quotation::from_result(&reference_result(), &settings, today());
        let text = render_quotation_text(&q);

        assert!(text.starts_with("QUOTATION\nQuote No: Q-"));
        assert!(text.contains("Fire Safety Solutions"));
        assert!(text.contains("Valid Until: 2026-11-01"));
        assert!(text.contains("$35.00/m"));
        assert!(text.contains("Safety Factor (10%)"));
        assert!(text.contains("$5,654.00"));
        assert!(text.contains("valid for 14 days"));
        assert!(!text.contains("Appliance Protection"));
    }
}
