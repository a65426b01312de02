//! # Estimating Session
//!
//! Working state of one user: appliance selection, custom appliances, expert
//! mode and the persisted calculation records. The CLI opens a session per
//! command over a [`FileStore`](crate::storage::FileStore); tests use a
//! [`MemoryStore`](crate::storage::MemoryStore).
//!
//! ```rust
//! use kfss_core::config::Settings;
//! use kfss_core::form::{FormField, FormValues};
//! use kfss_core::session::Session;
//! use kfss_core::storage::MemoryStore;
//!
//! let mut session = Session::open(MemoryStore::new(), Settings::default());
//! session.toggle_appliance("fryer").unwrap();
//!
//! let form = FormValues::reset_defaults().with(FormField::ProjectName, "Grill Line");
//! let result = session.perform_calculation(&form).unwrap();
//! assert_eq!(result.nozzles.appliances, 1);
//! assert_eq!(session.history().len(), 1);
//! ```

use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::catalog::{ApplianceSpec, STANDARD_APPLIANCES};
use crate::config::Settings;
use crate::errors::{CalcError, CalcResult};
use crate::estimator::{preview, EstimationResult, Estimator, IdGenerator, PreviewSummary};
use crate::form::{self, FormField, FormInputProvider};
use crate::pricing::Currency;
use crate::record_store::{LoadReport, RecordStore};
use crate::storage::{KeyValueStore, EXPERT_MODE_KEY};

/// Form view that fills a blank currency with the configured default
struct WithDefaultCurrency<'a, F> {
    form: &'a F,
    currency: Currency,
}

impl<F: FormInputProvider> FormInputProvider for WithDefaultCurrency<'_, F> {
    fn value(&self, field: FormField) -> Option<String> {
        match field {
            FormField::Currency => self
                .form
                .text(FormField::Currency)
                .or_else(|| Some(self.currency.code().to_string())),
            other => self.form.value(other),
        }
    }
}

#[derive(Debug)]
pub struct Session<S: KeyValueStore> {
    records: RecordStore<S>,
    estimator: Estimator,
    settings: Settings,
    expert_mode: bool,
    selected: BTreeSet<String>,
    custom_appliances: Vec<ApplianceSpec>,
    load_report: LoadReport,
}

impl<S: KeyValueStore> Session<S> {
    /// Open a session over `backend`, restoring records and the expert flag.
    ///
    /// Unreadable persisted values are dropped; see [`Session::load_report`].
    pub fn open(backend: S, settings: Settings) -> Self {
        let mut records = RecordStore::new(backend);
        let mut load_report = records.load_persisted();

        let expert_mode = match records.backend().get(EXPERT_MODE_KEY) {
            Ok(value) => value.as_deref() == Some("true"),
            Err(e) => {
                warn!(key = EXPERT_MODE_KEY, error = %e, "ignoring unreadable expert flag");
                load_report.recovered.push(e);
                false
            }
        };

        let ids = IdGenerator::new();
        if let Some(max) = records.max_id() {
            ids.observe(max);
        }

        Session {
            records,
            estimator: Estimator::with_ids(ids),
            settings,
            expert_mode,
            selected: BTreeSet::new(),
            custom_appliances: Vec::new(),
            load_report,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn load_report(&self) -> &LoadReport {
        &self.load_report
    }

    pub fn records(&self) -> &RecordStore<S> {
        &self.records
    }

    /// Recent calculations, newest first
    pub fn history(&self) -> &[EstimationResult] {
        self.records.all()
    }

    pub fn last_calculation(&self) -> Option<&EstimationResult> {
        self.records.last_calculation()
    }

    pub fn expert_mode(&self) -> bool {
        self.expert_mode
    }

    pub fn set_expert_mode(&mut self, enabled: bool) -> CalcResult<()> {
        let value = if enabled { "true" } else { "false" };
        self.records.backend_mut().set(EXPERT_MODE_KEY, value)?;
        self.expert_mode = enabled;
        Ok(())
    }

    /// Standard catalog followed by custom appliances in creation order
    pub fn available_appliances(&self) -> impl Iterator<Item = &ApplianceSpec> + '_ {
        STANDARD_APPLIANCES.iter().chain(self.custom_appliances.iter())
    }

    fn lookup(&self, id: &str) -> CalcResult<&ApplianceSpec> {
        self.available_appliances()
            .find(|a| a.id == id)
            .ok_or_else(|| CalcError::appliance_not_found(id))
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    /// Flip selection of an appliance; returns whether it is now selected
    pub fn toggle_appliance(&mut self, id: &str) -> CalcResult<bool> {
        self.lookup(id)?;
        if self.selected.remove(id) {
            Ok(false)
        } else {
            self.selected.insert(id.to_string());
            Ok(true)
        }
    }

    /// Select an appliance; selecting twice is a no-op
    pub fn select(&mut self, id: &str) -> CalcResult<()> {
        self.lookup(id)?;
        self.selected.insert(id.to_string());
        Ok(())
    }

    pub fn deselect_all(&mut self) {
        self.selected.clear();
    }

    /// Add a custom appliance and select it
    pub fn add_custom_appliance(&mut self, name: &str, nozzle_count: u32) -> CalcResult<ApplianceSpec> {
        let appliance = ApplianceSpec::custom(name, nozzle_count)?;
        self.selected.insert(appliance.id.clone());
        self.custom_appliances.push(appliance.clone());
        info!(id = %appliance.id, name = %appliance.name, nozzles = nozzle_count, "added custom appliance");
        Ok(appliance)
    }

    /// Selected appliances in display order
    pub fn selected_appliances(&self) -> Vec<ApplianceSpec> {
        self.available_appliances()
            .filter(|a| self.selected.contains(&a.id))
            .cloned()
            .collect()
    }

    /// Live summary for the current form; never fails
    pub fn preview(&self, form: &impl FormInputProvider) -> PreviewSummary {
        let view = WithDefaultCurrency {
            form,
            currency: self.settings.default_currency,
        };
        preview(&form::preview_input(&view, &self.selected_appliances()))
    }

    /// Validate the form, compute an estimate and record it.
    pub fn perform_calculation(&mut self, form: &impl FormInputProvider) -> CalcResult<EstimationResult> {
        let view = WithDefaultCurrency {
            form,
            currency: self.settings.default_currency,
        };
        let input = form::estimator_input(&view, &self.selected_appliances(), self.expert_mode)?;
        let result = self.estimator.compute(&input)?;
        self.records.append(result.clone())?;

        info!(
            id = result.id,
            project = %result.project.name,
            nozzles = result.nozzles.total,
            total = result.total_cost,
            currency = %result.currency(),
            "calculation recorded"
        );
        Ok(result)
    }

    /// Make a recent calculation current again.
    ///
    /// The record becomes the last calculation and its appliances become the
    /// selection; custom appliances it used are restored.
    pub fn load_recent(&mut self, id: u64) -> CalcResult<EstimationResult> {
        let record = self.records.find_by_id(id)?.clone();
        self.records.set_last_calculation(record.clone())?;

        self.selected.clear();
        for appliance in &record.configuration.appliances {
            if appliance.custom && !self.custom_appliances.iter().any(|a| a.id == appliance.id) {
                self.custom_appliances.push(appliance.clone());
            }
            self.selected.insert(appliance.id.clone());
        }

        info!(id, project = %record.project.name, "loaded recent calculation");
        Ok(record)
    }

    /// Forget history, last calculation, selection and custom appliances.
    /// Expert mode is kept.
    pub fn reset(&mut self) -> CalcResult<()> {
        self.records.clear()?;
        self.selected.clear();
        self.custom_appliances.clear();
        info!("session reset");
        Ok(())
    }
}
