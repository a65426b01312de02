//! Plain-text presentation of previews, committed estimates and history.
//!
//! Formatting only: every figure comes from a [`PreviewSummary`] or a stored
//! [`EstimationResult`], converted with the exchange rate the result carries.

use crate::estimator::{EstimationResult, PreviewSummary};
use crate::pricing::{CostCategory, Currency};

const RULE: &str = "═══════════════════════════════════════";

/// Currency amount with symbol, thousands separators and two decimals.
///
/// ```rust
/// use kfss_core::pricing::Currency;
/// use kfss_core::report::format_money;
///
/// assert_eq!(format_money(5654.0, Currency::USD), "$5,654.00");
/// assert_eq!(format_money(469282.5, Currency::INR), "₹469,282.50");
/// ```
pub fn format_money(amount: f64, currency: Currency) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if amount < 0.0 && fixed.chars().any(|c| c != '0' && c != '.') {
        "-"
    } else {
        ""
    };
    format!("{}{}{}.{}", sign, currency.symbol(), group_thousands(whole), fraction)
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

fn plural(count: u32, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}

/// "5kg cylinder" for a single cylinder, "10kg cylinders" otherwise
pub fn cylinder_description(cylinders: u32) -> &'static str {
    if cylinders > 1 {
        "10kg cylinders"
    } else {
        "5kg cylinder"
    }
}

/// Summary panel for the live preview.
pub fn summary_text(summary: &PreviewSummary) -> String {
    let q = &summary.quantities;
    let lines = [
        format!("Hood Area:          {:.1} m²", q.hood_area.value()),
        format!("Plenum Nozzles:     {}", q.nozzles.plenum),
        format!("Duct Nozzles:       {}", q.nozzles.duct),
        format!("Appliance Nozzles:  {}", q.nozzles.appliances),
        format!("Total Nozzles:      {}", q.nozzles.total),
        format!("Cylinders:          {}", q.cylinders_required),
        format!("Agent Weight:       {:.1} kg", q.agent_weight.value()),
        format!("Piping:             {} m", q.piping_length.value().round()),
        format!("Currency:           {}", summary.currency),
        format!("Estimated Cost:     {}", format_money(summary.total_cost, summary.currency)),
    ];
    lines.join("\n")
}

/// Full results view of a committed estimate.
pub fn results_report(result: &EstimationResult) -> String {
    let currency = result.currency();
    let money = |amount: f64| format_money(result.converted(amount), currency);
    let config = &result.configuration;
    let expert = &config.expert;
    let location = if result.project.location.is_empty() {
        "Not specified"
    } else {
        result.project.location.as_str()
    };

    let mut out = vec![
        RULE.to_string(),
        "  KITCHEN FIRE SUPPRESSION ESTIMATE".to_string(),
        RULE.to_string(),
        String::new(),
        "Project Information:".to_string(),
        format!("  Project:   {}", result.project.name),
        format!("  Client:    {}", result.project.client),
        format!("  Location:  {}", location),
        format!("  Currency:  {} ({})", currency, currency.symbol()),
        format!("  Date:      {}", result.timestamp.format("%Y-%m-%d %H:%M UTC")),
        format!("  Reference: {}", result.id),
        String::new(),
        "Hood & Duct:".to_string(),
        format!("  Length:          {} m", config.hood_length_m),
        format!("  Depth:           {} m", config.hood_depth_m),
        format!("  Area:            {:.1} m²", result.hood_area_m2.value()),
        format!("  Plenum Sections: {}", config.plenum_sections),
        format!("  Duct Openings:   {}", config.duct_sections),
    ];

    if config.expert_mode {
        out.push(format!("  Material:        {}", expert.hood_material));
        out.push(format!("  Duct Length:     {} m", expert.duct_length_m));
        out.push(format!("  Nozzle Type:     {}", expert.nozzle_type));
        out.push(format!("  Pressure Rating: {}", expert.pressure_rating));
    }

    out.push(String::new());
    out.push("Appliances:".to_string());
    if config.appliances.is_empty() {
        out.push("  No appliances selected".to_string());
    } else {
        for appliance in &config.appliances {
            out.push(format!(
                "  {:<28} {:<10} {}",
                appliance.display_name(),
                plural(appliance.nozzle_count, "nozzle", "nozzles"),
                money(appliance.price)
            ));
        }
    }

    let pipe = if expert.pipe_material.is_empty() {
        "galvanized"
    } else {
        expert.pipe_material.as_str()
    };
    out.push(String::new());
    out.push("Bill of Quantities:".to_string());
    out.push(format!(
        "  Total Nozzles:  {} (plenum {}, duct {}, appliances {})",
        result.nozzles.total, result.nozzles.plenum, result.nozzles.duct, result.nozzles.appliances
    ));
    out.push(format!(
        "  Cylinders:      {} x {}",
        result.cylinders_required,
        cylinder_description(result.cylinders_required)
    ));
    out.push(format!("  Wet Agent:      {:.1} kg", result.agent_weight_kg.value()));
    out.push(format!(
        "  Piping:         {} m ({} pipe)",
        result.piping_length_m.value().round(),
        pipe
    ));

    out.push(String::new());
    out.push(format!(
        "Cost Breakdown (incl. {}% safety factor):",
        result.safety_factor_percent()
    ));
    for (category, _) in result.subtotals.iter() {
        out.push(format!(
            "  {:<20} {:>16}",
            category.label(),
            format_money(result.converted_subtotal(category), currency)
        ));
    }
    out.push(String::new());
    out.push(RULE.to_string());
    out.push(format!("  TOTAL COST: {}", format_money(result.total_cost, currency)));
    out.push(RULE.to_string());

    if config.expert_mode && !expert.notes.trim().is_empty() {
        out.push(String::new());
        out.push(format!("Notes: {}", expert.notes.trim()));
    }

    out.join("\n")
}

/// One line for the recent-calculations list
pub fn history_line(result: &EstimationResult) -> String {
    format!(
        "{} • {} • {}{:.0} • {}",
        result.project.name,
        plural(result.nozzles.total, "nozzle", "nozzles"),
        result.currency().symbol(),
        result.total_cost,
        result.timestamp.format("%Y-%m-%d")
    )
}

/// Subtotal lines for a preview, in the quote currency
pub fn preview_breakdown(summary: &PreviewSummary) -> Vec<(CostCategory, String)> {
    summary
        .subtotals
        .iter()
        .map(|(category, amount)| {
            (category, format_money(amount * summary.exchange_rate, summary.currency))
        })
        .collect()
}
