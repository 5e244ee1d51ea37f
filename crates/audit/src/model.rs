use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::{OutlierMethod, Signal};
use crate::units::UnitFamily;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One catalog row. Numeric fields stay raw text; checks parse them.
#[derive(Debug, Clone, Default)]
pub struct ItemRecord {
    pub id: String,
    /// 1-based data row (header excluded).
    pub row: usize,
    pub name: String,
    pub uom: String,
    pub size: String,
    pub price: String,
    pub tax_rate: String,
    pub supplier_code: String,
    pub supplier: Option<String>,
    /// Every cell of the source row, in header order.
    pub raw_fields: Vec<String>,
}

/// One (name, quantity, UOM) slot of a recipe row.
#[derive(Debug, Clone, Default)]
pub struct IngredientLineInput {
    pub slot: usize,
    pub name: String,
    pub quantity: String,
    pub uom: String,
}

#[derive(Debug, Clone, Default)]
pub struct RecipeRecord {
    pub id: String,
    pub row: usize,
    pub name: Option<String>,
    /// Non-blank slots in slot order.
    pub lines: Vec<IngredientLineInput>,
    pub raw_fields: Vec<String>,
}

/// Pre-loaded tables.
#[derive(Debug, Clone, Default)]
pub struct AuditInput {
    pub items: Vec<ItemRecord>,
    pub recipes: Vec<RecipeRecord>,
}

// ---------------------------------------------------------------------------
// Validation flags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Check {
    Missing,
    NotNumeric,
    InvalidUom,
    UnreasonableMagnitude,
    UnreasonableQuantity,
}

impl Check {
    pub fn severity(&self) -> Severity {
        match self {
            Self::Missing | Self::NotNumeric | Self::InvalidUom => Severity::Error,
            Self::UnreasonableMagnitude | Self::UnreasonableQuantity => Severity::Warning,
        }
    }
}

impl std::fmt::Display for Check {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "MISSING"),
            Self::NotNumeric => write!(f, "NOT_NUMERIC"),
            Self::InvalidUom => write!(f, "INVALID_UOM"),
            Self::UnreasonableMagnitude => write!(f, "UNREASONABLE_MAGNITUDE"),
            Self::UnreasonableQuantity => write!(f, "UNREASONABLE_QUANTITY"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Size,
    Uom,
    Price,
    TaxRate,
    SupplierCode,
    Quantity,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name => write!(f, "name"),
            Self::Size => write!(f, "size"),
            Self::Uom => write!(f, "uom"),
            Self::Price => write!(f, "price"),
            Self::TaxRate => write!(f, "tax_rate"),
            Self::SupplierCode => write!(f, "supplier_code"),
            Self::Quantity => write!(f, "quantity"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Flag {
    pub check: Check,
    pub field: Field,
    pub severity: Severity,
    pub message: String,
}

/// Flags for one record, keyed by (check, field). Empty = clean.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationFlagSet {
    flags: Vec<Flag>,
}

impl ValidationFlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the flag for (check, field), keeping key order.
    pub fn insert(&mut self, check: Check, field: Field, message: impl Into<String>) {
        let flag = Flag {
            check,
            field,
            severity: check.severity(),
            message: message.into(),
        };
        match self
            .flags
            .binary_search_by(|f| (f.check, f.field).cmp(&(check, field)))
        {
            Ok(i) => self.flags[i] = flag,
            Err(i) => self.flags.insert(i, flag),
        }
    }

    pub fn get(&self, check: Check, field: Field) -> Option<&Flag> {
        self.flags.iter().find(|f| f.check == check && f.field == field)
    }

    pub fn has(&self, check: Check) -> bool {
        self.flags.iter().any(|f| f.check == check)
    }

    pub fn is_clean(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Flag> {
        self.flags.iter()
    }

    /// `CHECK(field): message; ...` or `OK`.
    pub fn describe(&self) -> String {
        if self.flags.is_empty() {
            return "OK".into();
        }
        self.flags
            .iter()
            .map(|f| format!("{}({}): {}", f.check, f.field, f.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemAudit {
    pub item_id: String,
    pub row: usize,
    pub name: String,
    pub flags: ValidationFlagSet,
    /// Cluster this item belongs to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_cluster: Option<usize>,
}

// ---------------------------------------------------------------------------
// Duplicates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalMatch {
    Match,
    NoMatch,
    /// One side blank, unparseable, or (for size) in another unit family.
    NotComparable,
}

impl SignalMatch {
    pub fn holds(self) -> bool {
        self == SignalMatch::Match
    }
}

/// Why two items were linked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairEvidence {
    pub left: String,
    pub right: String,
    pub left_row: usize,
    pub right_row: usize,
    pub name_score: f64,
    pub supplier: SignalMatch,
    pub size: SignalMatch,
    pub price: SignalMatch,
    /// Configured signals that held.
    pub matched_signals: Vec<Signal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterMember {
    /// Position in the input item slice; `row` is caller-supplied and may repeat.
    #[serde(skip)]
    pub item_index: usize,
    pub item_id: String,
    pub row: usize,
    pub name: String,
}

/// Connected component of the candidate-edge graph. Members need not be
/// pairwise similar; each is reachable through `edges`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateCluster {
    pub cluster_id: usize,
    pub members: Vec<ClusterMember>,
    pub edges: Vec<PairEvidence>,
}

// ---------------------------------------------------------------------------
// Recipe lines
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Exact,
    Fuzzy,
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub status: ResolutionStatus,
    #[serde(skip)]
    pub item_index: Option<usize>,
    pub item_id: Option<String>,
    pub item_name: Option<String>,
    /// 100 for exact matches; best candidate score when unresolved.
    pub score: f64,
    /// Best candidate below threshold, for review.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nearest: Option<String>,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        self.status != ResolutionStatus::Unresolved
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IncompatibleReason {
    FamilyMismatch,
    UnknownLineUnit,
    UnknownItemUnit,
    MissingLineUnit,
    MissingItemUnit,
    MissingQuantity,
    NonNumericQuantity,
    NonPositiveQuantity,
}

impl std::fmt::Display for IncompatibleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FamilyMismatch => write!(f, "family_mismatch"),
            Self::UnknownLineUnit => write!(f, "unknown_line_unit"),
            Self::UnknownItemUnit => write!(f, "unknown_item_unit"),
            Self::MissingLineUnit => write!(f, "missing_line_unit"),
            Self::MissingItemUnit => write!(f, "missing_item_unit"),
            Self::MissingQuantity => write!(f, "missing_quantity"),
            Self::NonNumericQuantity => write!(f, "non_numeric_quantity"),
            Self::NonPositiveQuantity => write!(f, "non_positive_quantity"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UomConsistency {
    Identical,
    /// `factor` takes a line quantity into the item's unit.
    Convertible { factor: f64 },
    Incompatible { reason: IncompatibleReason, detail: String },
    /// Line did not resolve to an item.
    NotChecked,
}

impl UomConsistency {
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Identical | Self::Convertible { .. })
    }

    pub fn label(&self) -> String {
        match self {
            Self::Identical => "identical".into(),
            Self::Convertible { .. } => "convertible".into(),
            Self::Incompatible { reason, .. } => format!("incompatible ({reason})"),
            Self::NotChecked => "not_checked".into(),
        }
    }
}

/// Why a line has no cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Unpriced {
    Unresolved,
    UomIncompatible,
    PriceMissing,
    PriceNotNumeric,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngredientLine {
    pub slot: usize,
    pub name: String,
    pub quantity_raw: String,
    pub quantity: Option<f64>,
    pub uom: String,
    pub family: UnitFamily,
    pub resolution: Resolution,
    pub consistency: UomConsistency,
    pub flags: ValidationFlagSet,
    pub cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unpriced: Option<Unpriced>,
}

// ---------------------------------------------------------------------------
// Recipe cost + outliers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierReason {
    Statistical,
    AbsoluteCeiling,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum OutlierVerdict {
    Normal,
    CostOutlier { reasons: Vec<OutlierReason> },
    /// Fewer than two priced recipes; no statistics.
    InsufficientData,
    /// No priceable lines; total is undefined.
    CostUndetermined,
}

impl OutlierVerdict {
    pub fn is_outlier(&self) -> bool {
        matches!(self, Self::CostOutlier { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeCostSummary {
    pub recipe_id: String,
    pub name: Option<String>,
    /// `None` when no line could be priced. Never reported as zero.
    pub total: Option<f64>,
    pub priced_lines: usize,
    pub excluded_lines: usize,
    pub verdict: OutlierVerdict,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeAudit {
    pub recipe_id: String,
    pub row: usize,
    pub name: Option<String>,
    pub lines: Vec<IngredientLine>,
    pub cost: RecipeCostSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CostStats {
    Computed {
        method: OutlierMethod,
        center: f64,
        spread: f64,
        population: usize,
        /// center + k * spread
        threshold: f64,
    },
    InsufficientData {
        population: usize,
    },
}

/// Flat report of ingredient names that did not resolve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingIngredient {
    pub recipe_id: String,
    pub recipe_name: Option<String>,
    pub slot: usize,
    pub ingredient_name: String,
    pub cleaned_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nearest: Option<String>,
    pub nearest_score: f64,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuditSummary {
    pub items: usize,
    pub clean_items: usize,
    pub flagged_items: usize,
    /// `CHECK` → number of flags raised, items and lines together.
    pub flag_counts: BTreeMap<String, usize>,
    pub duplicate_clusters: usize,
    pub items_in_clusters: usize,
    pub recipes: usize,
    pub lines: usize,
    pub resolved_exact: usize,
    pub resolved_fuzzy: usize,
    pub unresolved: usize,
    pub uom_identical: usize,
    pub uom_convertible: usize,
    pub uom_incompatible: usize,
    pub priced_lines: usize,
    pub excluded_lines: usize,
    pub costed_recipes: usize,
    pub undetermined_recipes: usize,
    pub cost_outliers: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
    pub outlier_method: OutlierMethod,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditResult {
    pub meta: AuditMeta,
    pub summary: AuditSummary,
    pub items: Vec<ItemAudit>,
    pub duplicates: Vec<DuplicateCluster>,
    pub recipes: Vec<RecipeAudit>,
    pub missing_ingredients: Vec<MissingIngredient>,
    pub cost_stats: CostStats,
}

impl AuditResult {
    /// Anything a reviewer should look at.
    pub fn has_findings(&self) -> bool {
        let s = &self.summary;
        s.flagged_items > 0
            || s.duplicate_clusters > 0
            || s.unresolved > 0
            || s.uom_incompatible > 0
            || s.cost_outliers > 0
            || s.undetermined_recipes > 0
    }
}
