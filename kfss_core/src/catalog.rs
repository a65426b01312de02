//! # Appliance Catalog
//!
//! Standard cooking appliances that need their own nozzle coverage, plus
//! user-defined custom appliances.
//!
//! ## Example
//!
//! ```rust
//! use kfss_core::catalog::{find_standard, ApplianceSpec};
//!
//! let fryer = find_standard("fryer").unwrap();
//! assert_eq!(fryer.nozzle_count, 1);
//!
//! let tandoor = ApplianceSpec::custom("Tandoor", 3).unwrap();
//! assert_eq!(tandoor.price, 1800.0);
//! assert!(tandoor.id.starts_with("custom-"));
//! ```

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{CalcError, CalcResult};

/// Smallest nozzle count an appliance may carry
pub const MIN_APPLIANCE_NOZZLES: u32 = 1;

/// Largest nozzle count an appliance may carry
pub const MAX_APPLIANCE_NOZZLES: u32 = 5;

/// Estimated price per nozzle for a custom appliance (USD)
pub const CUSTOM_PRICE_PER_NOZZLE: f64 = 600.0;

/// Prefix for generated custom appliance ids
pub const CUSTOM_ID_PREFIX: &str = "custom-";

/// An appliance protected by the system.
///
/// ## JSON Example
///
/// ```json
/// { "id": "range", "name": "Cooking Range", "nozzle_count": 2, "price": 1200.0, "custom": false }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplianceSpec {
    pub id: String,
    pub name: String,
    pub nozzle_count: u32,
    /// Protection price in USD
    pub price: f64,
    #[serde(default)]
    pub custom: bool,
}

impl ApplianceSpec {
    fn standard(id: &str, name: &str, nozzle_count: u32, price: f64) -> Self {
        ApplianceSpec {
            id: id.to_string(),
            name: name.to_string(),
            nozzle_count,
            price,
            custom: false,
        }
    }

    /// Create a custom appliance with an estimated price.
    ///
    /// The name is trimmed and must not be empty; the nozzle count must be
    /// within 1..=5.
    pub fn custom(name: &str, nozzle_count: u32) -> CalcResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CalcError::invalid_input("appliance_name", name, "Appliance name is required"));
        }
        check_nozzle_count(nozzle_count)?;

        Ok(ApplianceSpec {
            id: format!("{}{}", CUSTOM_ID_PREFIX, Uuid::new_v4().simple()),
            name: name.to_string(),
            nozzle_count,
            price: f64::from(nozzle_count) * CUSTOM_PRICE_PER_NOZZLE,
            custom: true,
        })
    }

    /// Name as shown in lists, with a marker for custom appliances
    pub fn display_name(&self) -> String {
        if self.custom {
            format!("{} (Custom)", self.name)
        } else {
            self.name.clone()
        }
    }

    /// Price per protected nozzle
    pub fn price_per_nozzle(&self) -> f64 {
        if self.nozzle_count == 0 {
            self.price
        } else {
            self.price / f64::from(self.nozzle_count)
        }
    }
}

/// Reject nozzle counts outside 1..=5
pub fn check_nozzle_count(nozzle_count: u32) -> CalcResult<()> {
    if !(MIN_APPLIANCE_NOZZLES..=MAX_APPLIANCE_NOZZLES).contains(&nozzle_count) {
        return Err(CalcError::invalid_input(
            "nozzle_count",
            nozzle_count.to_string(),
            "Nozzle count must be between 1 and 5",
        ));
    }
    Ok(())
}

/// Standard appliance catalog, in display order.
pub static STANDARD_APPLIANCES: Lazy<Vec<ApplianceSpec>> = Lazy::new(|| {
    vec![
        ApplianceSpec::standard("fryer", "Deep Fryer", 1, 850.0),
        ApplianceSpec::standard("range", "Cooking Range", 2, 1200.0),
        ApplianceSpec::standard("grill", "Griddle/Grill", 1, 750.0),
        ApplianceSpec::standard("broiler", "Broiler", 1, 900.0),
        ApplianceSpec::standard("wok", "Wok Station", 2, 1100.0),
        ApplianceSpec::standard("oven", "Convection Oven", 1, 650.0),
        ApplianceSpec::standard("steamer", "Steamer", 1, 700.0),
        ApplianceSpec::standard("dishwasher", "Dishwasher", 1, 600.0),
    ]
});

/// Look up a standard appliance by id
pub fn find_standard(id: &str) -> Option<&'static ApplianceSpec> {
    STANDARD_APPLIANCES.iter().find(|a| a.id == id)
}
