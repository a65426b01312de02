//! # kfss_core - Kitchen Fire Suppression Estimator
//!
//! `kfss_core` sizes and prices wet chemical fire suppression systems for
//! commercial kitchen hoods, keeps a short history of committed estimates and
//! turns them into customer quotations. Inputs, results and stored records are
//! JSON-serializable.
//!
//! ## Design Philosophy
//!
//! - **Pure estimator**: quantities and prices are computed without side effects
//! - **Explicit state**: a [`session::Session`] owns selection and records, over an injected store
//! - **Rich Errors**: structured error types naming every offending field
//!
//! ## Quick Start
//!
//! ```rust
//! use kfss_core::estimator::{Estimator, EstimatorInput, ProjectInfo};
//!
//! let input = EstimatorInput::new(ProjectInfo::new("Main Kitchen", "Bistro Ltd"), 3.0, 1.2, 2, 1);
//! let result = Estimator::new().compute(&input).unwrap();
//!
//! assert_eq!(result.nozzles.total, 3);
//! assert!((result.total_cost - 5654.0).abs() < 1e-6);
//! ```
//!
//! ## Modules
//!
//! - [`estimator`] - Bill of quantities, pricing, live preview and id generation
//! - [`catalog`] - Standard appliances and custom appliance rules
//! - [`pricing`] - Price table, cylinder sizes, currencies and cost categories
//! - [`form`] - Raw form values and how they become estimator inputs
//! - [`record_store`] - Bounded calculation history and last calculation
//! - [`session`] - Selection, expert mode and the calculate/load/reset workflow
//! - [`storage`] - Key-value backends and the data directory lock
//! - [`report`], [`quotation`], [`pdf`] - Text reports, quotations and PDF output
//! - [`config`] - Settings from `kfss.toml`
//! - [`units`] - Type-safe unit wrappers
//! - [`errors`] - Structured error types

pub mod catalog;
pub mod config;
pub mod errors;
pub mod estimator;
pub mod form;
pub mod pdf;
pub mod pricing;
pub mod quotation;
pub mod record_store;
pub mod report;
pub mod session;
pub mod storage;
pub mod units;

// Re-export commonly used types at crate root for convenience
pub use config::Settings;
pub use errors::{CalcError, CalcResult};
pub use estimator::{EstimationResult, Estimator, EstimatorInput};
pub use record_store::RecordStore;
pub use session::Session;
pub use storage::{FileStore, KeyValueStore, MemoryStore};
