//! # KFSS CLI Application
//!
//! Terminal front end for the kitchen fire suppression estimator. Each command
//! opens a session over the data directory, so history, the last calculation
//! and expert mode carry over between runs.
//!
//! ```text
//! kfss estimate --project "Main Kitchen" --client "Bistro Ltd" --appliance fryer
//! kfss history
//! kfss quote --pdf quotation.pdf
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use kfss_core::catalog::STANDARD_APPLIANCES;
use kfss_core::form::{FormField, FormValues};
use kfss_core::pdf::render_quotation_pdf;
use kfss_core::pricing::Currency;
use kfss_core::quotation::{render_quotation_text, Quotation};
use kfss_core::report::{format_money, history_line, preview_breakdown, results_report, summary_text};
use kfss_core::storage::DataDirLock;
use kfss_core::{CalcError, CalcResult, EstimationResult, FileStore, Session, Settings};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kfss")]
#[command(about = "KFSS - Kitchen fire suppression system estimator", long_about = None)]
struct Cli {
    /// Data directory (defaults to $KFSS_DATA_DIR, then .kfss)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Settings file (defaults to kfss.toml in the data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Calculate and record an estimate
    Estimate {
        #[command(flatten)]
        form: FormArgs,
        /// Print the stored result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Live summary without recording anything
    Preview {
        #[command(flatten)]
        form: FormArgs,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recent calculations, newest first
    History {
        #[arg(long)]
        json: bool,
    },
    /// Show the last calculation, or a recent one by id
    Show {
        id: Option<u64>,
        #[arg(long)]
        json: bool,
    },
    /// Make a recent calculation the current one
    Load { id: u64 },
    /// Clear history, the last calculation and custom appliances
    Reset,
    /// Quotation for the last calculation, or a recent one by id
    Quote {
        id: Option<u64>,
        /// Also write the quotation as PDF
        #[arg(long)]
        pdf: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// List the standard appliance catalog
    Catalog,
    /// Show or change expert mode
    Expert { state: Option<Toggle> },
    /// Print the effective settings as TOML
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

/// Form fields as typed on the command line; parsing is left to the estimator
#[derive(Args, Default)]
struct FormArgs {
    #[arg(long)]
    project: Option<String>,
    #[arg(long)]
    client: Option<String>,
    #[arg(long)]
    location: Option<String>,
    /// Hood length in meters
    #[arg(long)]
    length: Option<String>,
    /// Hood depth in meters
    #[arg(long)]
    depth: Option<String>,
    /// Plenum sections
    #[arg(long)]
    plenum: Option<String>,
    /// Duct sections
    #[arg(long)]
    duct: Option<String>,
    /// USD, EUR, INR or AED
    #[arg(long)]
    currency: Option<String>,
    #[arg(long)]
    hood_material: Option<String>,
    /// Duct run in meters (expert mode)
    #[arg(long)]
    duct_length: Option<String>,
    #[arg(long)]
    nozzle_type: Option<String>,
    #[arg(long)]
    pipe_material: Option<String>,
    /// Safety factor in percent
    #[arg(long)]
    safety_factor: Option<String>,
    #[arg(long)]
    pressure_rating: Option<String>,
    #[arg(long)]
    notes: Option<String>,
    /// Standard appliance id to protect (repeatable, see `kfss catalog`)
    #[arg(long = "appliance")]
    appliances: Vec<String>,
    /// Custom appliance as NAME:NOZZLES (repeatable)
    #[arg(long = "custom")]
    customs: Vec<String>,
    /// Start from the last calculation instead of the reset values
    #[arg(long)]
    from_last: bool,
}

impl FormArgs {
    fn overrides(&self) -> [(FormField, &Option<String>); 15] {
        [
            (FormField::ProjectName, &self.project),
            (FormField::ClientName, &self.client),
            (FormField::ProjectLocation, &self.location),
            (FormField::HoodLength, &self.length),
            (FormField::HoodDepth, &self.depth),
            (FormField::PlenumSections, &self.plenum),
            (FormField::DuctSections, &self.duct),
            (FormField::Currency, &self.currency),
            (FormField::HoodMaterial, &self.hood_material),
            (FormField::DuctLength, &self.duct_length),
            (FormField::NozzleType, &self.nozzle_type),
            (FormField::PipeMaterial, &self.pipe_material),
            (FormField::SafetyFactor, &self.safety_factor),
            (FormField::PressureRating, &self.pressure_rating),
            (FormField::Notes, &self.notes),
        ]
    }

    /// Form values: reset values (or the last calculation) with overrides applied
    fn to_form(&self, last: Option<&EstimationResult>, default_currency: Currency) -> FormValues {
        let mut form = match last.filter(|_| self.from_last) {
            Some(result) => FormValues::from_result(result),
            None => FormValues::reset_defaults().with(FormField::Currency, default_currency.code()),
        };
        for (field, value) in self.overrides() {
            if let Some(value) = value {
                form.set(field, value.clone());
            }
        }
        form
    }

    /// Apply appliance flags (and the last selection with `--from-last`) to the session
    fn apply_selection(&self, session: &mut Session<FileStore>) -> CalcResult<()> {
        if self.from_last {
            let previous = session
                .last_calculation()
                .map(|r| r.configuration.appliances.clone())
                .unwrap_or_default();
            for appliance in previous {
                if appliance.custom {
                    session.add_custom_appliance(&appliance.name, appliance.nozzle_count)?;
                } else {
                    session.select(&appliance.id)?;
                }
            }
        }
        for id in &self.appliances {
            session.select(id)?;
        }
        for spec in &self.customs {
            let (name, nozzles) = parse_custom(spec)?;
            session.add_custom_appliance(name, nozzles)?;
        }
        Ok(())
    }
}

/// Parse `NAME:NOZZLES`
fn parse_custom(spec: &str) -> CalcResult<(&str, u32)> {
    let invalid = || CalcError::invalid_input("custom", spec, "Expected NAME:NOZZLES, e.g. \"Pizza Oven:2\"");
    let (name, nozzles) = spec.rsplit_once(':').ok_or_else(invalid)?;
    let nozzles = nozzles.trim().parse().map_err(|_| invalid())?;
    Ok((name, nozzles))
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Ok(json) = serde_json::to_string_pretty(&e) {
                eprintln!();
                eprintln!("Error JSON:");
                eprintln!("{}", json);
            }
            ExitCode::FAILURE
        }
    }
}

fn lock_owner() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "kfss".to_string())
}

fn open_session(settings: &Settings) -> CalcResult<Session<FileStore>> {
    let store = FileStore::open(&settings.data_dir)?;
    debug!(dir = %settings.data_dir.display(), "opened data directory");
    Ok(Session::open(store, settings.clone()))
}

/// Session plus an exclusive lock on its data directory.
///
/// The lock is held before any record is read.
fn open_locked(settings: &Settings) -> CalcResult<(Session<FileStore>, DataDirLock)> {
    let store = FileStore::open(&settings.data_dir)?;
    let lock = DataDirLock::acquire(store.root(), lock_owner())?;
    debug!(dir = %settings.data_dir.display(), "locked data directory");
    Ok((Session::open(store, settings.clone()), lock))
}

fn run(cli: Cli) -> CalcResult<()> {
    let settings = Settings::resolve(cli.config.as_deref(), cli.data_dir.as_deref())?;

    match cli.command {
        Commands::Estimate { form, json } => cmd_estimate(&settings, &form, json),
        Commands::Preview { form, json } => cmd_preview(&settings, &form, json),
        Commands::History { json } => cmd_history(&settings, json),
        Commands::Show { id, json } => cmd_show(&settings, id, json),
        Commands::Load { id } => cmd_load(&settings, id),
        Commands::Reset => cmd_reset(&settings),
        Commands::Quote { id, pdf, json } => cmd_quote(&settings, id, pdf.as_deref(), json),
        Commands::Catalog => {
            cmd_catalog();
            Ok(())
        }
        Commands::Expert { state } => cmd_expert(&settings, state),
        Commands::Config => {
            println!("{}", settings.to_toml()?);
            Ok(())
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> CalcResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_estimate(settings: &Settings, args: &FormArgs, json: bool) -> CalcResult<()> {
    let (mut session, _lock) = open_locked(settings)?;
    args.apply_selection(&mut session)?;
    let form = args.to_form(session.last_calculation(), settings.default_currency);

    let result = session.perform_calculation(&form)?;
    if json {
        return print_json(&result);
    }
    println!("{}", results_report(&result));
    println!();
    println!("Saved as calculation {}", result.id);
    Ok(())
}

fn cmd_preview(settings: &Settings, args: &FormArgs, json: bool) -> CalcResult<()> {
    let mut session = open_session(settings)?;
    args.apply_selection(&mut session)?;
    let form = args.to_form(session.last_calculation(), settings.default_currency);

    let summary = session.preview(&form);
    if json {
        return print_json(&summary);
    }
    println!("{}", summary_text(&summary));
    println!();
    println!("Cost breakdown (before safety factor):");
    for (category, amount) in preview_breakdown(&summary) {
        println!("  {:<20} {:>16}", category.label(), amount);
    }
    Ok(())
}

fn cmd_history(settings: &Settings, json: bool) -> CalcResult<()> {
    let session = open_session(settings)?;
    if json {
        return print_json(&session.history());
    }
    if session.history().is_empty() {
        println!("No recent calculations");
        return Ok(());
    }
    for result in session.history() {
        println!("{:>15}  {}", result.id, history_line(result));
    }
    Ok(())
}

/// A recent calculation by id, or the last calculation
fn pick(session: &Session<FileStore>, id: Option<u64>) -> CalcResult<EstimationResult> {
    match id {
        Some(id) => session.records().find_by_id(id).cloned(),
        None => session.last_calculation().cloned().ok_or_else(|| {
            CalcError::invalid_input("calculation", "none", "No calculation yet; run `kfss estimate` first")
        }),
    }
}

fn cmd_show(settings: &Settings, id: Option<u64>, json: bool) -> CalcResult<()> {
    let session = open_session(settings)?;
    let result = pick(&session, id)?;
    if json {
        return print_json(&result);
    }
    println!("{}", results_report(&result));
    Ok(())
}

fn cmd_load(settings: &Settings, id: u64) -> CalcResult<()> {
    let (mut session, _lock) = open_locked(settings)?;
    let result = session.load_recent(id)?;
    println!("Loaded calculation: {}", result.project.name);
    println!("{}", history_line(&result));
    Ok(())
}

fn cmd_reset(settings: &Settings) -> CalcResult<()> {
    let (mut session, _lock) = open_locked(settings)?;
    session.reset()?;
    println!("Calculator reset. Expert mode is {}.", on_off(session.expert_mode()));
    Ok(())
}

fn cmd_quote(settings: &Settings, id: Option<u64>, pdf: Option<&Path>, json: bool) -> CalcResult<()> {
    let session = open_session(settings)?;
    let result = pick(&session, id)?;
    let quotation = Quotation::from_result(&result, settings, Utc::now().date_naive());

    if json {
        print_json(&quotation)?;
    } else {
        println!("{}", render_quotation_text(&quotation));
    }

    if let Some(path) = pdf {
        let bytes = render_quotation_pdf(&quotation)?;
        std::fs::write(path, bytes)
            .map_err(|e| CalcError::file_error("write pdf", path.display().to_string(), e.to_string()))?;
        eprintln!("Wrote {}", path.display());
    }
    Ok(())
}

fn cmd_catalog() {
    println!("{:<12} {:<18} {:>7} {:>12}", "ID", "Appliance", "Nozzles", "Price");
    for appliance in STANDARD_APPLIANCES.iter() {
        println!(
            "{:<12} {:<18} {:>7} {:>12}",
            appliance.id,
            appliance.name,
            appliance.nozzle_count,
            format_money(appliance.price, Currency::USD)
        );
    }
    println!();
    println!("Custom appliances: --custom \"NAME:NOZZLES\" (1-5 nozzles, $600 per nozzle)");
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

fn cmd_expert(settings: &Settings, state: Option<Toggle>) -> CalcResult<()> {
    match state {
        None => {
            let session = open_session(settings)?;
            println!("Expert mode is {}", on_off(session.expert_mode()));
        }
        Some(toggle) => {
            let (mut session, _lock) = open_locked(settings)?;
            session.set_expert_mode(matches!(toggle, Toggle::On))?;
            println!("Expert mode is {}", on_off(session.expert_mode()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings_in(dir: &TempDir) -> Settings {
        Settings {
            data_dir: dir.path().to_path_buf(),
            ..Settings::default()
        }
    }

    #[test]
    fn test_parse_custom() {
        assert_eq!(parse_custom("Pizza Oven:2").unwrap(), ("Pizza Oven", 2));
        assert_eq!(parse_custom("Grill: Combi:3").unwrap(), ("Grill: Combi", 3));
        assert_eq!(parse_custom("Smoker").unwrap_err().error_code(), "INVALID_INPUT");
        assert!(parse_custom("Smoker:many").is_err());
    }

    #[test]
    fn test_form_overrides() {
        let args = FormArgs {
            project: Some("Line 2".to_string()),
            length: Some("4.5".to_string()),
            ..FormArgs::default()
        };
        let form = args.to_form(None, Currency::AED);
        assert_eq!(form, FormValues::reset_defaults()
            .with(FormField::Currency, "AED")
            .with(FormField::ProjectName, "Line 2")
            .with(FormField::HoodLength, "4.5"));
    }

    #[test]
    fn test_estimate_then_quote_in_data_dir() {
        let dir = TempDir::new().unwrap();
        let settings = settings_in(&dir);

        let args = FormArgs {
            appliances: vec!["fryer".to_string()],
            customs: vec!["Pizza Oven:2".to_string()],
            ..FormArgs::default()
        };
        cmd_estimate(&settings, &args, true).unwrap();

        let session = open_session(&settings).unwrap();
        let last = session.last_calculation().unwrap();
        assert_eq!(last.nozzles.appliances, 3);
        assert!(!dir.path().join(".kfss.lock").exists());

        let pdf_path = dir.path().join("quote.pdf");
        cmd_quote(&settings, None, Some(&pdf_path), false).unwrap();
        assert!(std::fs::read(&pdf_path).unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn test_from_last_reuses_selection() {
        let dir = TempDir::new().unwrap();
        let settings = settings_in(&dir);

        let first = FormArgs {
            project: Some("Original".to_string()),
            appliances: vec!["wok".to_string()],
            ..FormArgs::default()
        };
        cmd_estimate(&settings, &first, true).unwrap();

        let again = FormArgs {
            duct: Some("3".to_string()),
            from_last: true,
            ..FormArgs::default()
        };
        cmd_estimate(&settings, &again, true).unwrap();

        let session = open_session(&settings).unwrap();
        let last = session.last_calculation().unwrap();
        assert_eq!(last.project.name, "Original");
        assert_eq!(last.nozzles.duct, 3);
        assert_eq!(last.nozzles.appliances, 2);
        assert_eq!(session.history().len(), 2);
    }

    #[test]
    fn test_locked_estimate_sees_records_committed_meanwhile() {
        let dir = TempDir::new().unwrap();
        let settings = settings_in(&dir);

        let held = DataDirLock::acquire(&settings.data_dir, "other").unwrap();
        let err = cmd_estimate(&settings, &FormArgs::default(), true).unwrap_err();
        assert_eq!(err.error_code(), "FILE_LOCKED");

        let committed = open_session(&settings)
            .unwrap()
            .perform_calculation(&FormValues::reset_defaults().with(FormField::ProjectName, "Other"))
            .unwrap();
        drop(held);

        cmd_estimate(&settings, &FormArgs::default(), true).unwrap();
        let session = open_session(&settings).unwrap();
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history()[1].id, committed.id);
        assert!(session.history()[0].id > committed.id);
    }

    #[test]
    fn test_show_without_calculation_fails() {
        let dir = TempDir::new().unwrap();
        let err = cmd_show(&settings_in(&dir), None, false).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
        assert_eq!(cmd_show(&settings_in(&dir), Some(7), false).unwrap_err().error_code(), "NOT_FOUND");
    }
}
