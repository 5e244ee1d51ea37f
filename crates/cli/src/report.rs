//! CSV review reports written by `larder audit --out-dir`.
//!
//! Each report echoes the source table's own columns and appends the
//! audit's per-row findings, so a buyer can sort and filter it in a
//! spreadsheet next to the data they already know.

use std::collections::BTreeSet;

use larder_audit::config::{ColumnsConfig, RecipeColumns};
use larder_audit::model::{
    AuditResult, DuplicateCluster, Field, IngredientLine, ItemAudit, OutlierVerdict, RecipeAudit, ResolutionStatus,
    Unpriced, UomConsistency, ValidationFlagSet,
};
use larder_audit::{ItemRecord, RecipeRecord};

pub const ITEMS_REPORT: &str = "items_with_validation_flags.csv";
pub const RECIPES_REPORT: &str = "recipes_with_validation_flags.csv";
pub const MISSING_REPORT: &str = "missing_ingredients.csv";

/// Item fields that get their own status column, in report order.
const ITEM_STATUS_COLUMNS: [(Field, &str); 6] = [
    (Field::Name, "Name_Status"),
    (Field::Size, "Size_Status"),
    (Field::Uom, "UOM_Status"),
    (Field::Price, "Price_Status"),
    (Field::TaxRate, "Tax_Rate_Status"),
    (Field::SupplierCode, "Supplier_Code_Status"),
];

fn writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, csv::Error> {
    writer.into_inner().map_err(|e| csv::Error::from(e.into_error()))
}

/// Source row padded (or cut) to the header width; short rows are legal input.
fn source_cells(raw: &[String], width: usize) -> Vec<String> {
    let mut cells: Vec<String> = raw.iter().take(width).cloned().collect();
    cells.resize(width, String::new());
    cells
}

/// `OK`, or the checks raised on `field` joined with `|`.
fn field_status(flags: &ValidationFlagSet, field: Field) -> String {
    let checks: Vec<String> = flags
        .iter()
        .filter(|f| f.field == field)
        .map(|f| f.check.to_string())
        .collect();
    if checks.is_empty() {
        "OK".into()
    } else {
        checks.join("|")
    }
}

fn money(v: f64) -> String {
    format!("{v:.4}")
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// Other members of the item's cluster; `index` is the item's position in the table.
fn duplicates_info(index: usize, audit: &ItemAudit, clusters: &[DuplicateCluster]) -> String {
    let Some(cluster) = audit
        .duplicate_cluster
        .and_then(|id| clusters.iter().find(|c| c.cluster_id == id))
    else {
        return String::new();
    };
    let others: Vec<String> = cluster
        .members
        .iter()
        .filter(|m| m.item_index != index)
        .map(|m| format!("row {} ({})", m.row, m.name.trim()))
        .collect();
    format!("possible duplicate of {}", others.join(", "))
}

pub fn items_report(headers: &[String], items: &[ItemRecord], result: &AuditResult) -> Result<Vec<u8>, csv::Error> {
    let mut w = writer();

    let mut header: Vec<String> = headers.to_vec();
    header.extend(ITEM_STATUS_COLUMNS.iter().map(|(_, name)| name.to_string()));
    header.extend(
        ["Validation_Flags", "Flag_Count", "Duplicate_Cluster", "Potential_Duplicates_Info"]
            .iter()
            .map(|s| s.to_string()),
    );
    w.write_record(&header)?;

    for (index, (item, audit)) in items.iter().zip(&result.items).enumerate() {
        let mut record = source_cells(&item.raw_fields, headers.len());
        record.extend(ITEM_STATUS_COLUMNS.iter().map(|(field, _)| field_status(&audit.flags, *field)));
        record.push(audit.flags.describe());
        record.push(audit.flags.len().to_string());
        record.push(audit.duplicate_cluster.map(|c| c.to_string()).unwrap_or_default());
        record.push(duplicates_info(index, audit, &result.duplicates));
        w.write_record(&record)?;
    }
    finish(w)
}

// ---------------------------------------------------------------------------
// Recipes
// ---------------------------------------------------------------------------

fn resolution_status(line: &IngredientLine) -> &'static str {
    match line.resolution.status {
        ResolutionStatus::Exact => "FOUND",
        ResolutionStatus::Fuzzy => "FUZZY",
        ResolutionStatus::Unresolved => "MISSING",
    }
}

fn line_cost(line: &IngredientLine) -> String {
    match (line.cost, line.unpriced) {
        (Some(cost), _) => money(cost),
        (None, Some(Unpriced::Unresolved)) => "not priced (unresolved)".into(),
        (None, Some(Unpriced::UomIncompatible)) => "not priced (uom)".into(),
        (None, Some(Unpriced::PriceMissing)) => "not priced (no price)".into(),
        (None, Some(Unpriced::PriceNotNumeric)) => "not priced (bad price)".into(),
        (None, None) => String::new(),
    }
}

fn consistency_status(line: &IngredientLine) -> String {
    match &line.consistency {
        UomConsistency::NotChecked => String::new(),
        other => other.label(),
    }
}

fn cost_warning(recipe: &RecipeAudit) -> &'static str {
    match recipe.cost.verdict {
        OutlierVerdict::Normal => "OK",
        OutlierVerdict::CostOutlier { .. } => "Potentially High Cost",
        OutlierVerdict::InsufficientData => "Insufficient Data",
        OutlierVerdict::CostUndetermined => "Cost Not Calculated",
    }
}

pub fn recipes_report(
    headers: &[String],
    recipes: &[RecipeRecord],
    result: &AuditResult,
) -> Result<Vec<u8>, csv::Error> {
    let slots: BTreeSet<usize> = result
        .recipes
        .iter()
        .flat_map(|r| r.lines.iter().map(|l| l.slot))
        .collect();

    let mut w = writer();
    let mut header: Vec<String> = headers.to_vec();
    for slot in &slots {
        header.push(format!("Status (Ingredient {slot})"));
        header.push(format!("Flags (Ingredient {slot})"));
        header.push(format!("UOM_Status (Ingredient {slot})"));
        header.push(format!("Est_Cost (Ingredient {slot})"));
    }
    header.push("Calculated_Recipe_Total_Cost".into());
    header.push("Recipe_Cost_Warning".into());
    w.write_record(&header)?;

    for (recipe, audit) in recipes.iter().zip(&result.recipes) {
        let mut record = source_cells(&recipe.raw_fields, headers.len());
        for slot in &slots {
            match audit.lines.iter().find(|l| l.slot == *slot) {
                Some(line) => {
                    record.push(resolution_status(line).into());
                    record.push(if line.flags.is_clean() {
                        String::new()
                    } else {
                        line.flags.describe()
                    });
                    record.push(consistency_status(line));
                    record.push(line_cost(line));
                }
                None => record.extend(std::iter::repeat(String::new()).take(4)),
            }
        }
        record.push(audit.cost.total.map(money).unwrap_or_default());
        record.push(cost_warning(audit).into());
        w.write_record(&record)?;
    }
    finish(w)
}

// ---------------------------------------------------------------------------
// Missing ingredients
// ---------------------------------------------------------------------------

pub fn missing_report(result: &AuditResult, columns: &ColumnsConfig) -> Result<Vec<u8>, csv::Error> {
    let mut w = writer();
    w.write_record([
        "recipe_id",
        "recipe_name",
        "ingredient_column",
        "missing_ingredient_name",
        "cleaned_missing_ingredient_name",
        "nearest_match",
        "nearest_score",
    ])?;
    for missing in &result.missing_ingredients {
        w.write_record([
            missing.recipe_id.as_str(),
            missing.recipe_name.as_deref().unwrap_or(""),
            RecipeColumns::slot_column(&columns.recipes.ingredient_name, missing.slot).as_str(),
            missing.ingredient_name.as_str(),
            missing.cleaned_name.as_str(),
            missing.nearest.as_deref().unwrap_or(""),
            format!("{:.1}", missing.nearest_score).as_str(),
        ])?;
    }
    finish(w)
}
