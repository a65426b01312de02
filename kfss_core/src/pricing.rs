//! # Pricing and Currency Tables
//!
//! Fixed component prices (USD), supported quote currencies and the closed set
//! of cost categories that make up a bill.
//!
//! All prices are in the base currency (USD). Conversion into the quote
//! currency happens once on the total and again at presentation time using the
//! exchange rate stored with each result.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::CalcError;

/// Maximum nozzles one cylinder can service
pub const NOZZLES_PER_CYLINDER: u32 = 6;

/// Wet chemical agent per cylinder (kg)
pub const AGENT_KG_PER_CYLINDER: f64 = 5.7;

/// Branch piping run per nozzle (m)
pub const PIPING_PER_NOZZLE_M: f64 = 2.0;

/// Fixed main piping run (m)
pub const MAIN_PIPING_RUN_M: f64 = 5.0;

/// Component price table in USD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    pub nozzle: f64,
    pub cylinder_5kg: f64,
    pub cylinder_10kg: f64,
    pub piping_per_meter: f64,
    pub hood_agent_tank: f64,
    pub manual_release: f64,
    pub installation_labor: f64,
    pub commissioning: f64,
}

/// The price table every estimate is computed against.
pub const PRICES: PriceTable = PriceTable {
    nozzle: 85.0,
    cylinder_5kg: 1200.0,
    cylinder_10kg: 1900.0,
    piping_per_meter: 35.0,
    hood_agent_tank: 1800.0,
    manual_release: 250.0,
    installation_labor: 850.0,
    commissioning: 400.0,
};

impl PriceTable {
    /// Unit price for each cylinder in a system of `count` cylinders.
    ///
    /// More than one cylinder moves every unit to the 10 kg size, not just
    /// the excess.
    pub fn cylinder_unit_price(&self, count: u32) -> f64 {
        CylinderSize::for_count(count).unit_price(self)
    }
}

/// Cylinder size selected for a system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CylinderSize {
    #[serde(rename = "5kg")]
    FiveKg,
    #[serde(rename = "10kg")]
    TenKg,
}

impl CylinderSize {
    pub fn for_count(count: u32) -> Self {
        if count > 1 {
            CylinderSize::TenKg
        } else {
            CylinderSize::FiveKg
        }
    }

    pub fn unit_price(self, prices: &PriceTable) -> f64 {
        match self {
            CylinderSize::FiveKg => prices.cylinder_5kg,
            CylinderSize::TenKg => prices.cylinder_10kg,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CylinderSize::FiveKg => "5kg",
            CylinderSize::TenKg => "10kg",
        }
    }
}

/// Quote currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Currency {
    #[default]
    USD,
    EUR,
    INR,
    AED,
}

impl Currency {
    pub const ALL: [Currency; 4] = [Currency::USD, Currency::EUR, Currency::INR, Currency::AED];

    /// Units of this currency per USD
    pub fn exchange_rate(self) -> f64 {
        match self {
            Currency::USD => 1.0,
            Currency::EUR => 0.92,
            Currency::INR => 83.0,
            Currency::AED => 3.67,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::INR => "₹",
            Currency::AED => "د.إ",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::INR => "INR",
            Currency::AED => "AED",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = CalcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        Currency::ALL
            .into_iter()
            .find(|c| c.code() == code)
            .ok_or_else(|| CalcError::invalid_input("currency", s, "Supported currencies are USD, EUR, INR, AED"))
    }
}

/// One named cost bucket of a bill, in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostCategory {
    Nozzles,
    Cylinders,
    Piping,
    HoodAgentTank,
    ManualRelease,
    InstallationLabor,
    Commissioning,
    Appliances,
}

impl CostCategory {
    pub const ALL: [CostCategory; 8] = [
        CostCategory::Nozzles,
        CostCategory::Cylinders,
        CostCategory::Piping,
        CostCategory::HoodAgentTank,
        CostCategory::ManualRelease,
        CostCategory::InstallationLabor,
        CostCategory::Commissioning,
        CostCategory::Appliances,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CostCategory::Nozzles => "Nozzles",
            CostCategory::Cylinders => "Cylinders",
            CostCategory::Piping => "Piping",
            CostCategory::HoodAgentTank => "Hood Agent Tank",
            CostCategory::ManualRelease => "Manual Release",
            CostCategory::InstallationLabor => "Installation Labor",
            CostCategory::Commissioning => "Commissioning",
            CostCategory::Appliances => "Appliances",
        }
    }

    /// Flat price for categories that do not scale with the system size
    pub fn fixed_price(self, prices: &PriceTable) -> Option<f64> {
        match self {
            CostCategory::HoodAgentTank => Some(prices.hood_agent_tank),
            CostCategory::ManualRelease => Some(prices.manual_release),
            CostCategory::InstallationLabor => Some(prices.installation_labor),
            CostCategory::Commissioning => Some(prices.commissioning),
            _ => None,
        }
    }
}

impl fmt::Display for CostCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cylinder_tie_break() {
        assert_eq!(PRICES.cylinder_unit_price(1), 1200.0);
        assert_eq!(PRICES.cylinder_unit_price(2), 1900.0);
        assert_eq!(CylinderSize::for_count(0), CylinderSize::FiveKg);
        assert_eq!(CylinderSize::for_count(3), CylinderSize::TenKg);
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("eur".parse::<Currency>().unwrap(), Currency::EUR);
        assert_eq!(" AED ".parse::<Currency>().unwrap(), Currency::AED);
        let err = "GBP".parse::<Currency>().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
    }

    #[test]
    fn test_currency_serialization() {
        let json = serde_json::to_string(&Currency::INR).unwrap();
        assert_eq!(json, "\"INR\"");
        assert_eq!(Currency::INR.exchange_rate(), 83.0);
    }

    #[test]
    fn test_fixed_categories() {
        let fixed: Vec<_> = CostCategory::ALL
            .iter()
            .filter_map(|c| c.fixed_price(&PRICES))
            .collect();
        assert_eq!(fixed, vec![1800.0, 250.0, 850.0, 400.0]);
        assert_eq!(CostCategory::HoodAgentTank.label(), "Hood Agent Tank");
    }
}
