use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::AuditError;
use crate::parse::NumberFormat;
use crate::similarity::Scorer;
use crate::units::{default_unit_table, normalize_unit, UnitDef, UnitFamily, UomRegistry};

/// Placeholder for the slot number in repeating recipe columns.
pub const SLOT_PLACEHOLDER: &str = "{n}";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Every threshold and mapping the audit uses. All sections have defaults,
/// so an empty file is valid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    pub name: String,
    pub input: InputConfig,
    pub units: Vec<UnitDef>,
    pub numbers: NumberFormat,
    pub validation: ValidationConfig,
    pub bounds: BoundsConfig,
    pub duplicates: DuplicateConfig,
    pub resolve: ResolveConfig,
    pub cost: CostConfig,
    pub outliers: OutlierConfig,
    pub columns: ColumnsConfig,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            name: "audit".into(),
            input: InputConfig::default(),
            units: default_unit_table(),
            numbers: NumberFormat::default(),
            validation: ValidationConfig::default(),
            bounds: BoundsConfig::default(),
            duplicates: DuplicateConfig::default(),
            resolve: ResolveConfig::default(),
            cost: CostConfig::default(),
            outliers: OutlierConfig::default(),
            columns: ColumnsConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Input (adapter only; the engine never reads files)
// ---------------------------------------------------------------------------

/// File paths, relative to the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub items: Option<String>,
    pub recipes: Option<String>,
}

// ---------------------------------------------------------------------------
// Field validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Supplier codes must be all digits.
    pub supplier_code_numeric: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            supplier_code_numeric: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Magnitude bounds
// ---------------------------------------------------------------------------

/// Soft upper bounds. Family limits are in the family base unit; `units`
/// overrides a family limit for one unit and is expressed in that unit.
///
/// Providing a section replaces its defaults wholesale.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MagnitudeBounds {
    pub mass: Option<f64>,
    pub volume: Option<f64>,
    pub count: Option<f64>,
    pub units: BTreeMap<String, f64>,
}

/// Where a limit came from, for messages.
#[derive(Debug, Clone, PartialEq)]
pub enum Limit<'a> {
    /// Limit in the value's own unit.
    Unit(f64),
    /// Limit in the family base unit.
    Family(f64, &'a str),
}

impl MagnitudeBounds {
    pub fn family_max(&self, family: UnitFamily) -> Option<f64> {
        match family {
            UnitFamily::Mass => self.mass,
            UnitFamily::Volume => self.volume,
            UnitFamily::Count => self.count,
            UnitFamily::Unknown => None,
        }
    }

    /// Limit applying to `canonical`, unit override first.
    pub fn limit_for<'r>(&self, canonical: &str, registry: &'r UomRegistry) -> Option<Limit<'r>> {
        let unit_max = self
            .units
            .iter()
            .find(|(unit, _)| normalize_unit(unit) == canonical)
            .map(|(_, max)| *max);
        if let Some(max) = unit_max {
            return Some(Limit::Unit(max));
        }
        let family = registry.family(canonical);
        let max = self.family_max(family)?;
        let base = registry.base_unit(family)?;
        Some(Limit::Family(max, base))
    }

    fn check(&self, section: &str) -> Result<(), AuditError> {
        let family_limits = [("mass", self.mass), ("volume", self.volume), ("count", self.count)];
        for (name, limit) in family_limits {
            if let Some(v) = limit {
                check_positive(&format!("bounds.{section}.{name}"), v)?;
            }
        }
        for (unit, v) in &self.units {
            check_positive(&format!("bounds.{section}.units.{unit}"), *v)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BoundsConfig {
    pub item_size: MagnitudeBounds,
    pub recipe_quantity: MagnitudeBounds,
}

impl Default for BoundsConfig {
    fn default() -> Self {
        let item_units = [("g", 10_000.0), ("ml", 10_000.0), ("kg", 100.0), ("l", 100.0), ("ea", 1_000.0)];
        Self {
            item_size: MagnitudeBounds {
                mass: Some(100_000.0),
                volume: Some(100_000.0),
                count: Some(1_000.0),
                units: item_units.iter().map(|(u, v)| (u.to_string(), *v)).collect(),
            },
            recipe_quantity: MagnitudeBounds {
                mass: Some(10_000.0),
                volume: Some(10_000.0),
                count: Some(100.0),
                units: BTreeMap::new(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Duplicate detection
// ---------------------------------------------------------------------------

/// Supplementary evidence that, with a name match, makes two items a
/// duplicate candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Supplier,
    Size,
    Price,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Supplier => write!(f, "supplier"),
            Self::Size => write!(f, "size"),
            Self::Price => write!(f, "price"),
        }
    }
}

/// Edge rule: `name_score >= name_threshold` AND at least `min_signals` of
/// `signals` match.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DuplicateConfig {
    pub name_threshold: f64,
    pub scorer: Scorer,
    /// Relative tolerance on size, compared in the family base unit.
    pub tol_size: f64,
    /// Relative tolerance on price.
    pub tol_price: f64,
    pub signals: Vec<Signal>,
    pub min_signals: usize,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            name_threshold: 85.0,
            scorer: Scorer::TokenSet,
            tol_size: 0.01,
            tol_price: 0.01,
            signals: vec![Signal::Supplier, Signal::Size, Signal::Price],
            min_signals: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Ingredient resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    pub threshold: f64,
    pub scorer: Scorer,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            threshold: 90.0,
            scorer: Scorer::TokenSort,
        }
    }
}

// ---------------------------------------------------------------------------
// Cost + outliers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    /// Gross up item prices by their tax rate.
    pub include_tax: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
    /// Mean and sample standard deviation.
    MeanStddev,
    /// Median and MAD scaled to be consistent with a standard deviation.
    MedianMad,
}

impl std::fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MeanStddev => write!(f, "mean_stddev"),
            Self::MedianMad => write!(f, "median_mad"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    pub method: OutlierMethod,
    pub k: f64,
    /// Absolute cost ceiling; `None` disables it.
    pub ceiling: Option<f64>,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            method: OutlierMethod::MeanStddev,
            k: 3.0,
            ceiling: Some(500.0),
        }
    }
}

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ColumnsConfig {
    pub items: ItemColumns,
    pub recipes: RecipeColumns,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ItemColumns {
    /// Identity column; the 1-based row number is used when unset.
    pub id: Option<String>,
    pub name: String,
    pub uom: String,
    pub size: String,
    pub price: String,
    pub tax_rate: String,
    pub supplier_code: String,
    /// Supplier display name, reports only. Tolerated when absent.
    pub supplier: Option<String>,
}

impl Default for ItemColumns {
    fn default() -> Self {
        Self {
            id: None,
            name: "Item name".into(),
            uom: "Item Unit of Measure".into(),
            size: "Item size".into(),
            price: "€ Price per unit (excluding VAT)".into(),
            tax_rate: "Tax rate".into(),
            supplier_code: "Supplier code".into(),
            supplier: Some("Supplier".into()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecipeColumns {
    pub id: Option<String>,
    /// Display name. Tolerated when absent.
    pub name: Option<String>,
    /// Templates for the repeating ingredient group; `{n}` is the slot.
    pub ingredient_name: String,
    pub quantity: String,
    pub uom: String,
}

impl Default for RecipeColumns {
    fn default() -> Self {
        Self {
            id: None,
            name: Some("Menu item name".into()),
            ingredient_name: "Name (Ingredient {n})".into(),
            quantity: "Qty (Ingredient {n})".into(),
            uom: "Unit (Ingredient {n})".into(),
        }
    }
}

impl RecipeColumns {
    /// Column name for one slot of a template.
    pub fn slot_column(template: &str, slot: usize) -> String {
        template.replace(SLOT_PLACEHOLDER, &slot.to_string())
    }

    /// Slot number if `header` is an instance of `template`.
    pub fn match_slot(template: &str, header: &str) -> Option<usize> {
        let (prefix, suffix) = template.split_once(SLOT_PLACEHOLDER)?;
        let digits = header.strip_prefix(prefix)?.strip_suffix(suffix)?;
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl AuditConfig {
    pub fn from_toml(input: &str) -> Result<Self, AuditError> {
        let config: AuditConfig =
            toml::from_str(input).map_err(|e| AuditError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Build the unit registry this config describes.
    pub fn registry(&self) -> Result<UomRegistry, AuditError> {
        UomRegistry::new(&self.units)
    }

    pub fn validate(&self) -> Result<(), AuditError> {
        let registry = self.registry()?;

        check_score("duplicates.name_threshold", self.duplicates.name_threshold)?;
        check_score("resolve.threshold", self.resolve.threshold)?;
        check_non_negative("duplicates.tol_size", self.duplicates.tol_size)?;
        check_non_negative("duplicates.tol_price", self.duplicates.tol_price)?;

        if self.duplicates.signals.is_empty() {
            return Err(AuditError::ConfigValidation(
                "duplicates.signals must name at least one signal".into(),
            ));
        }
        let mut seen = Vec::new();
        for signal in &self.duplicates.signals {
            if seen.contains(signal) {
                return Err(AuditError::ConfigValidation(format!(
                    "duplicates.signals: '{signal}' listed twice"
                )));
            }
            seen.push(*signal);
        }
        if self.duplicates.min_signals == 0 || self.duplicates.min_signals > seen.len() {
            return Err(AuditError::ConfigValidation(format!(
                "duplicates.min_signals must be between 1 and {}, got {}",
                seen.len(),
                self.duplicates.min_signals
            )));
        }

        check_positive("outliers.k", self.outliers.k)?;
        if let Some(ceiling) = self.outliers.ceiling {
            check_positive("outliers.ceiling", ceiling)?;
        }

        self.bounds.item_size.check("item_size")?;
        self.bounds.recipe_quantity.check("recipe_quantity")?;
        let bound_units = self
            .bounds
            .item_size
            .units
            .keys()
            .chain(self.bounds.recipe_quantity.units.keys());
        for unit in bound_units {
            match registry.canonical(unit) {
                Some(canonical) if canonical == normalize_unit(unit) => {}
                Some(canonical) => {
                    return Err(AuditError::ConfigValidation(format!(
                        "bounds: '{unit}' is an alias, use '{canonical}'"
                    )));
                }
                None => log::warn!("bounds: unit '{unit}' is not in the unit table, ignored"),
            }
        }

        if self.numbers.decimal_separator != '.' && self.numbers.decimal_separator != ',' {
            return Err(AuditError::ConfigValidation(format!(
                "numbers.decimal_separator must be '.' or ',', got '{}'",
                self.numbers.decimal_separator
            )));
        }

        self.validate_columns()
    }

    fn validate_columns(&self) -> Result<(), AuditError> {
        let items = &self.columns.items;
        let required = [
            ("columns.items.name", &items.name),
            ("columns.items.uom", &items.uom),
            ("columns.items.size", &items.size),
            ("columns.items.price", &items.price),
            ("columns.items.tax_rate", &items.tax_rate),
            ("columns.items.supplier_code", &items.supplier_code),
        ];
        for (key, column) in required {
            if column.trim().is_empty() {
                return Err(AuditError::ConfigValidation(format!("{key} must not be empty")));
            }
        }
        for (i, (key, a)) in required.iter().enumerate() {
            if let Some((other, _)) = required[i + 1..].iter().find(|(_, b)| *b == *a) {
                return Err(AuditError::ConfigValidation(format!(
                    "{key} and {other} map to the same column '{a}'"
                )));
            }
        }

        let recipes = &self.columns.recipes;
        let templates = [
            ("columns.recipes.ingredient_name", &recipes.ingredient_name),
            ("columns.recipes.quantity", &recipes.quantity),
            ("columns.recipes.uom", &recipes.uom),
        ];
        for (key, template) in templates {
            if template.matches(SLOT_PLACEHOLDER).count() != 1 {
                return Err(AuditError::ConfigValidation(format!(
                    "{key} must contain '{}' exactly once, got '{template}'",
                    SLOT_PLACEHOLDER
                )));
            }
        }
        if recipes.ingredient_name == recipes.quantity
            || recipes.ingredient_name == recipes.uom
            || recipes.quantity == recipes.uom
        {
            return Err(AuditError::ConfigValidation(
                "columns.recipes: ingredient templates must be distinct".into(),
            ));
        }
        Ok(())
    }
}

fn check_score(key: &str, v: f64) -> Result<(), AuditError> {
    if !v.is_finite() || !(0.0..=100.0).contains(&v) {
        return Err(AuditError::ConfigValidation(format!(
            "{key} must be between 0 and 100, got {v}"
        )));
    }
    Ok(())
}

fn check_non_negative(key: &str, v: f64) -> Result<(), AuditError> {
    if !v.is_finite() || v < 0.0 {
        return Err(AuditError::ConfigValidation(format!(
            "{key} must be a non-negative number, got {v}"
        )));
    }
    Ok(())
}

fn check_positive(key: &str, v: f64) -> Result<(), AuditError> {
    if !v.is_finite() || v <= 0.0 {
        return Err(AuditError::ConfigValidation(format!(
            "{key} must be a positive number, got {v}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
name = "Kitchen audit"

[input]
items = "items.csv"
recipes = "recipes.csv"

[[units]]
unit = "g"
family = "mass"
factor = 1.0
aliases = ["gram", "grams"]

[[units]]
unit = "kg"
family = "mass"
factor = 1000.0

[[units]]
unit = "ea"
family = "count"
factor = 1.0

[numbers]
decimal_separator = ","
currency_symbols = ["€"]

[bounds.item_size]
mass = 50000.0
[bounds.item_size.units]
kg = 50.0

[duplicates]
name_threshold = 80
scorer = "token_sort"
tol_size = 0.05
tol_price = 0.02
signals = ["supplier", "price"]
min_signals = 2

[resolve]
threshold = 95

[cost]
include_tax = true

[outliers]
method = "median_mad"
k = 3.5
ceiling = 250.0

[columns.items]
id = "SKU"
name = "Name"
uom = "UOM"
size = "Size"
price = "Price"
tax_rate = "VAT"
supplier_code = "Code"

[columns.recipes]
id = "Recipe ID"
name = "Dish"
ingredient_name = "Ingredient {n} name"
quantity = "Ingredient {n} qty"
uom = "Ingredient {n} unit"
"#;

    #[test]
    fn empty_config_uses_defaults() {
        let config = AuditConfig::from_toml("").unwrap();
        assert_eq!(config.name, "audit");
        assert_eq!(config.units.len(), 5);
        assert_eq!(config.duplicates.name_threshold, 85.0);
        assert_eq!(config.duplicates.scorer, Scorer::TokenSet);
        assert_eq!(config.duplicates.min_signals, 1);
        assert_eq!(config.resolve.threshold, 90.0);
        assert_eq!(config.outliers.k, 3.0);
        assert_eq!(config.outliers.ceiling, Some(500.0));
        assert_eq!(config.outliers.method, OutlierMethod::MeanStddev);
        assert_eq!(config.bounds.item_size.units["g"], 10_000.0);
        assert_eq!(config.columns.items.price, "€ Price per unit (excluding VAT)");
        assert!(config.validation.supplier_code_numeric);
        assert!(!config.cost.include_tax);
    }

    #[test]
    fn parse_full_config() {
        let config = AuditConfig::from_toml(FULL).unwrap();
        assert_eq!(config.name, "Kitchen audit");
        assert_eq!(config.input.items.as_deref(), Some("items.csv"));
        assert_eq!(config.units.len(), 3);
        assert_eq!(config.numbers.decimal_separator, ',');
        assert_eq!(config.bounds.item_size.mass, Some(50_000.0));
        assert_eq!(config.bounds.item_size.volume, None);
        assert_eq!(config.bounds.item_size.units["kg"], 50.0);
        assert_eq!(config.duplicates.signals, vec![Signal::Supplier, Signal::Price]);
        assert_eq!(config.duplicates.min_signals, 2);
        assert_eq!(config.duplicates.scorer, Scorer::TokenSort);
        assert_eq!(config.resolve.threshold, 95.0);
        assert!(config.cost.include_tax);
        assert_eq!(config.outliers.method, OutlierMethod::MedianMad);
        assert_eq!(config.outliers.ceiling, Some(250.0));
        assert_eq!(config.columns.items.id.as_deref(), Some("SKU"));
        assert_eq!(config.columns.recipes.name.as_deref(), Some("Dish"));
        // recipe bounds untouched
        assert_eq!(config.bounds.recipe_quantity.count, Some(100.0));
    }

    #[test]
    fn reject_unknown_section() {
        let err = AuditConfig::from_toml("[thresholds]\nname = 80\n").unwrap_err();
        assert!(matches!(err, AuditError::ConfigParse(_)));
    }

    #[test]
    fn reject_threshold_out_of_range() {
        let err = AuditConfig::from_toml("[duplicates]\nname_threshold = 120\n").unwrap_err();
        assert!(err.to_string().contains("duplicates.name_threshold"));

        let err = AuditConfig::from_toml("[resolve]\nthreshold = -1\n").unwrap_err();
        assert!(err.to_string().contains("resolve.threshold"));
    }

    #[test]
    fn reject_empty_unit_table() {
        let err = AuditConfig::from_toml("units = []\n").unwrap_err();
        assert!(err.to_string().contains("unit table is empty"));
    }

    #[test]
    fn reject_bad_signal_policy() {
        let err = AuditConfig::from_toml("[duplicates]\nsignals = []\n").unwrap_err();
        assert!(err.to_string().contains("at least one signal"));

        let err = AuditConfig::from_toml("[duplicates]\nsignals = [\"size\"]\nmin_signals = 2\n")
            .unwrap_err();
        assert!(err.to_string().contains("min_signals"));

        let err = AuditConfig::from_toml("[duplicates]\nsignals = [\"colour\"]\n").unwrap_err();
        assert!(matches!(err, AuditError::ConfigParse(_)));
    }

    #[test]
    fn reject_non_positive_k() {
        let err = AuditConfig::from_toml("[outliers]\nk = 0\n").unwrap_err();
        assert!(err.to_string().contains("outliers.k"));
    }

    #[test]
    fn reject_template_without_placeholder() {
        let err =
            AuditConfig::from_toml("[columns.recipes]\ningredient_name = \"Ingredient\"\n").unwrap_err();
        assert!(err.to_string().contains("{n}"));
    }

    #[test]
    fn reject_blank_or_shared_item_columns() {
        let err = AuditConfig::from_toml("[columns.items]\nname = \" \"\n").unwrap_err();
        assert!(err.to_string().contains("columns.items.name"));

        let err = AuditConfig::from_toml("[columns.items]\nsize = \"Tax rate\"\n").unwrap_err();
        assert!(err.to_string().contains("same column"));
    }

    #[test]
    fn reject_bound_keyed_by_alias() {
        let err = AuditConfig::from_toml("[bounds.item_size.units]\ngrams = 10.0\n").unwrap_err();
        assert!(err.to_string().contains("use 'g'"));
    }

    #[test]
    fn bound_for_unknown_unit_is_ignored() {
        let config = AuditConfig::from_toml("[bounds.item_size.units]\noz = 10.0\n").unwrap();
        let registry = config.registry().unwrap();
        assert_eq!(
            config.bounds.item_size.limit_for("g", &registry),
            None,
            "section replaces the default unit and family limits"
        );
    }

    #[test]
    fn reject_bad_decimal_separator() {
        let err = AuditConfig::from_toml("[numbers]\ndecimal_separator = \";\"\n").unwrap_err();
        assert!(err.to_string().contains("decimal_separator"));
    }

    #[test]
    fn slot_templates() {
        assert_eq!(RecipeColumns::slot_column("Qty (Ingredient {n})", 3), "Qty (Ingredient 3)");
        assert_eq!(RecipeColumns::match_slot("Name (Ingredient {n})", "Name (Ingredient 12)"), Some(12));
        assert_eq!(RecipeColumns::match_slot("Name (Ingredient {n})", "Name (Ingredient )"), None);
        assert_eq!(RecipeColumns::match_slot("Name (Ingredient {n})", "Qty (Ingredient 1)"), None);
        assert_eq!(RecipeColumns::match_slot("Ingredient {n}", "Ingredient 2b"), None);
    }

    #[test]
    fn limit_prefers_unit_override() {
        let config = AuditConfig::default();
        let registry = config.registry().unwrap();
        let bounds = &config.bounds.item_size;
        assert_eq!(bounds.limit_for("kg", &registry), Some(Limit::Unit(100.0)));
        let recipe = &config.bounds.recipe_quantity;
        assert_eq!(recipe.limit_for("kg", &registry), Some(Limit::Family(10_000.0, "g")));
    }
}
