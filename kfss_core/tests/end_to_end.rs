use kfss_core::config::Settings;
use kfss_core::form::{FormField, FormValues};
use kfss_core::pricing::{CostCategory, Currency, CylinderSize};
use kfss_core::quotation::Quotation;
use kfss_core::report::{format_money, results_report};
use kfss_core::estimator::MAX_SECTIONS;
use kfss_core::{MemoryStore, Session};

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

fn reference_form() -> FormValues {
    FormValues::reset_defaults()
        .with(FormField::ProjectName, "Main Kitchen")
        .with(FormField::ClientName, "Bistro Ltd")
        .with(FormField::HoodLength, "3.0")
        .with(FormField::HoodDepth, "1.2")
        .with(FormField::PlenumSections, "2")
        .with(FormField::DuctSections, "1")
        .with(FormField::Currency, "USD")
}

#[test]
fn reference_kitchen_from_form_to_quotation() {
    let mut session = Session::open(MemoryStore::new(), Settings::default());
    let result = session
        .perform_calculation(&reference_form())
        .expect("reference calculation failed");

    assert_eq!(result.nozzles.total, 3);
    assert_eq!(result.cylinders_required, 1);
    assert_eq!(result.cylinder_size, CylinderSize::FiveKg);
    assert!(close(result.agent_weight_kg.value(), 5.7));
    assert!(close(result.piping_length_m.value(), 11.0));

    let expected = [
        (CostCategory::Nozzles, 280.5),
        (CostCategory::Cylinders, 1320.0),
        (CostCategory::Piping, 423.5),
        (CostCategory::HoodAgentTank, 1980.0),
        (CostCategory::ManualRelease, 275.0),
        (CostCategory::InstallationLabor, 935.0),
        (CostCategory::Commissioning, 440.0),
        (CostCategory::Appliances, 0.0),
    ];
    for (category, amount) in expected {
        assert!(
            close(result.subtotals.get(category), amount),
            "{} was {}",
            category,
            result.subtotals.get(category)
        );
    }
    assert!(close(result.total_cost, 5654.0));

    let report = results_report(&result);
    assert!(report.contains("TOTAL COST: $5,654.00"));

    let today = result.timestamp.date_naive();
    let quotation = Quotation::from_result(&result, session.settings(), today);
    assert!(close(quotation.subtotal, 5140.0));
    assert!(close(quotation.grand_total, 5654.0));
}

#[test]
fn stored_subtotals_reproduce_total_in_any_currency() {
    let mut session = Session::open(MemoryStore::new(), Settings::default());
    session.select("range").expect("range is a standard appliance");
    session
        .add_custom_appliance("Pizza Oven", 3)
        .expect("valid custom appliance");

    for currency in Currency::ALL {
        let form = reference_form().with(FormField::Currency, currency.code());
        let result = session.perform_calculation(&form).expect("calculation failed");

        let rederived: f64 = result
            .subtotals
            .iter()
            .map(|(category, _)| result.converted_subtotal(category))
            .sum();
        assert!(
            (rederived - result.total_cost).abs() < 1e-6 * result.total_cost.max(1.0),
            "{}: {} vs {}",
            currency,
            rederived,
            result.total_cost
        );
        assert_eq!(result.nozzles.appliances, 5);
    }
}

#[test]
fn expert_mode_adds_duct_run_and_custom_safety() {
    let mut session = Session::open(MemoryStore::new(), Settings::default());
    session.set_expert_mode(true).expect("store write failed");

    let form = reference_form()
        .with(FormField::DuctLength, "8")
        .with(FormField::SafetyFactor, "20");
    let result = session.perform_calculation(&form).expect("calculation failed");

    assert!(close(result.piping_length_m.value(), 19.0));
    assert!(close(result.subtotals.get(CostCategory::Piping), 19.0 * 35.0 * 1.2));

    // Preview never applies the expert duct run or the safety factor
    let summary = session.preview(&form);
    assert!(close(summary.quantities.piping_length.value(), 11.0));
    assert_eq!(format_money(summary.total_cost, summary.currency), "$5,140.00");
}

#[test]
fn invalid_form_reports_every_field() {
    let mut session = Session::open(MemoryStore::new(), Settings::default());
    let form = FormValues::new()
        .with(FormField::HoodLength, "abc")
        .with(FormField::PlenumSections, "-2")
        .with(FormField::Currency, "GBP");

    let err = session.perform_calculation(&form).unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");

    let fields = err.fields();
    for field in [
        "project_name",
        "client_name",
        "hood_length_m",
        "hood_depth_m",
        "plenum_sections",
        "currency",
    ] {
        assert!(fields.contains(&field), "missing {} in {:?}", field, fields);
    }
    assert!(session.history().is_empty());
}

#[test]
fn rapid_calculations_get_increasing_ids() {
    let mut session = Session::open(MemoryStore::new(), Settings::default());
    let ids: Vec<u64> = (0..20)
        .map(|_| session.perform_calculation(&reference_form()).unwrap().id)
        .collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn huge_section_counts_never_panic() {
    let mut session = Session::open(MemoryStore::new(), Settings::default());
    let form = reference_form()
        .with(FormField::PlenumSections, u32::MAX.to_string())
        .with(FormField::DuctSections, (MAX_SECTIONS + 1).to_string());

    let summary = session.preview(&form);
    assert_eq!(summary.quantities.nozzles.total, 3);
    assert!(summary.total_cost.is_finite());

    let err = session.perform_calculation(&form).unwrap_err();
    assert_eq!(err.fields(), vec!["plenum_sections", "duct_sections"]);
    assert!(session.history().is_empty());
}

#[test]
fn overflowing_inputs_are_rejected_not_stored() {
    let mut session = Session::open(MemoryStore::new(), Settings::default());
    let kept = session.perform_calculation(&reference_form()).unwrap();

    let huge_hood = reference_form()
        .with(FormField::HoodLength, "1e200")
        .with(FormField::HoodDepth, "1e200");
    let err = session.perform_calculation(&huge_hood).unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");

    let huge_safety = reference_form().with(FormField::SafetyFactor, "1e308");
    assert!(session.perform_calculation(&huge_safety).is_err());

    assert_eq!(session.history().len(), 1);
    assert_eq!(session.last_calculation().unwrap().id, kept.id);
    assert!(session.preview(&huge_hood).total_cost.is_finite());
}
