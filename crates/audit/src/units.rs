//! Unit-of-measure registry.
//!
//! Units are grouped into families. Every unit carries a linear factor to its
//! family's base unit (the unit with factor 1), so conversion within a family
//! is `qty * from.factor / to.factor`. Nothing converts across families.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{AuditError, UomError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitFamily {
    Mass,
    Volume,
    Count,
    Unknown,
}

impl std::fmt::Display for UnitFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mass => write!(f, "mass"),
            Self::Volume => write!(f, "volume"),
            Self::Count => write!(f, "count"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// One row of the unit table, as it appears in config.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UnitDef {
    pub unit: String,
    pub family: UnitFamily,
    /// Multiplier into the family base unit.
    pub factor: f64,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl UnitDef {
    fn new(unit: &str, family: UnitFamily, factor: f64, aliases: &[&str]) -> Self {
        Self {
            unit: unit.into(),
            family,
            factor,
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Default unit table: g/kg, ml/l and ea.
pub fn default_unit_table() -> Vec<UnitDef> {
    vec![
        UnitDef::new("g", UnitFamily::Mass, 1.0, &["gram", "grams"]),
        UnitDef::new("kg", UnitFamily::Mass, 1000.0, &["kilogram", "kilograms"]),
        UnitDef::new(
            "ml",
            UnitFamily::Volume,
            1.0,
            &["milliliter", "milliliters", "millilitre", "millilitres"],
        ),
        UnitDef::new("l", UnitFamily::Volume, 1000.0, &["liter", "liters", "litre", "litres"]),
        UnitDef::new("ea", UnitFamily::Count, 1.0, &["each"]),
    ]
}

/// Trim, lowercase, drop a trailing period ("Kg." → "kg").
pub fn normalize_unit(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    lowered
        .strip_suffix('.')
        .unwrap_or(lowered.as_str())
        .trim_end()
        .to_string()
}

#[derive(Debug, Clone)]
struct UnitEntry {
    family: UnitFamily,
    factor: f64,
}

/// Immutable for the lifetime of a run; shared by reference.
#[derive(Debug, Clone)]
pub struct UomRegistry {
    /// canonical token → family + factor
    units: BTreeMap<String, UnitEntry>,
    /// any accepted token (canonical or alias) → canonical token
    tokens: BTreeMap<String, String>,
    base_units: BTreeMap<UnitFamily, String>,
}

impl UomRegistry {
    pub fn new(table: &[UnitDef]) -> Result<Self, AuditError> {
        if table.is_empty() {
            return Err(AuditError::ConfigValidation("unit table is empty".into()));
        }

        let mut units = BTreeMap::new();
        let mut tokens = BTreeMap::new();
        let mut base_units = BTreeMap::new();

        for def in table {
            let canonical = normalize_unit(&def.unit);
            if canonical.is_empty() {
                return Err(AuditError::ConfigValidation("unit table: blank unit token".into()));
            }
            if def.family == UnitFamily::Unknown {
                return Err(AuditError::ConfigValidation(format!(
                    "unit '{canonical}': family must be mass, volume or count"
                )));
            }
            if !def.factor.is_finite() || def.factor <= 0.0 {
                return Err(AuditError::ConfigValidation(format!(
                    "unit '{canonical}': factor must be a positive number, got {}",
                    def.factor
                )));
            }

            for token in std::iter::once(&def.unit).chain(def.aliases.iter()) {
                let token = normalize_unit(token);
                if token.is_empty() {
                    continue;
                }
                if tokens.insert(token.clone(), canonical.clone()).is_some() {
                    return Err(AuditError::ConfigValidation(format!(
                        "unit table: token '{token}' declared more than once"
                    )));
                }
            }

            if def.factor == 1.0 {
                base_units.entry(def.family).or_insert_with(|| canonical.clone());
            }
            units.insert(
                canonical,
                UnitEntry {
                    family: def.family,
                    factor: def.factor,
                },
            );
        }

        for entry in units.values() {
            if !base_units.contains_key(&entry.family) {
                return Err(AuditError::ConfigValidation(format!(
                    "unit table: {} family has no base unit (factor = 1)",
                    entry.family
                )));
            }
        }

        Ok(Self {
            units,
            tokens,
            base_units,
        })
    }

    /// Every accepted token, canonical units and aliases alike.
    pub fn allowed_units(&self) -> BTreeSet<&str> {
        self.tokens.keys().map(|t| t.as_str()).collect()
    }

    pub fn is_known(&self, unit: &str) -> bool {
        self.tokens.contains_key(&normalize_unit(unit))
    }

    /// Canonical token for any accepted spelling.
    pub fn canonical(&self, unit: &str) -> Option<&str> {
        self.tokens.get(&normalize_unit(unit)).map(|c| c.as_str())
    }

    pub fn family(&self, unit: &str) -> UnitFamily {
        self.entry(unit).map(|(_, e)| e.family).unwrap_or(UnitFamily::Unknown)
    }

    pub fn base_unit(&self, family: UnitFamily) -> Option<&str> {
        self.base_units.get(&family).map(|b| b.as_str())
    }

    /// Multiplier taking a quantity in `from` to a quantity in `to`.
    pub fn factor(&self, from: &str, to: &str) -> Result<f64, UomError> {
        let (from_canon, from_entry) = self
            .entry(from)
            .ok_or_else(|| UomError::UnknownUnit(from.trim().to_string()))?;
        let (to_canon, to_entry) = self
            .entry(to)
            .ok_or_else(|| UomError::UnknownUnit(to.trim().to_string()))?;

        if from_entry.family != to_entry.family {
            return Err(UomError::IncompatibleUnits {
                from: from_canon.to_string(),
                from_family: from_entry.family.to_string(),
                to: to_canon.to_string(),
                to_family: to_entry.family.to_string(),
            });
        }
        if from_canon == to_canon {
            return Ok(1.0);
        }
        Ok(from_entry.factor / to_entry.factor)
    }

    pub fn convert(&self, qty: f64, from: &str, to: &str) -> Result<f64, UomError> {
        if self.factor(from, to)? == 1.0 {
            return Ok(qty);
        }
        let (base_qty, _) = self.to_base(qty, from)?;
        let (to_one, _) = self.to_base(1.0, to)?;
        Ok(base_qty / to_one)
    }

    /// Quantity expressed in the family base unit.
    pub fn to_base(&self, qty: f64, unit: &str) -> Result<(f64, UnitFamily), UomError> {
        let (_, entry) = self
            .entry(unit)
            .ok_or_else(|| UomError::UnknownUnit(unit.trim().to_string()))?;
        Ok((qty * entry.factor, entry.family))
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// (canonical, family, factor) for every unit, ordered by family then factor.
    pub fn describe(&self) -> Vec<(&str, UnitFamily, f64)> {
        let mut rows: Vec<_> = self
            .units
            .iter()
            .map(|(unit, e)| (unit.as_str(), e.family, e.factor))
            .collect();
        rows.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.total_cmp(&b.2)));
        rows
    }

    fn entry(&self, unit: &str) -> Option<(&str, &UnitEntry)> {
        let canonical = self.tokens.get(&normalize_unit(unit))?;
        self.units.get(canonical).map(|e| (canonical.as_str(), e))
    }
}
