//! CSV text → input records, applying the configured column mapping.
//!
//! Takes the table contents as `&str`; reading files is the caller's job.

use std::collections::BTreeMap;

use crate::config::{ColumnsConfig, RecipeColumns};
use crate::error::AuditError;
use crate::model::{IngredientLineInput, ItemRecord, RecipeRecord};
use crate::parse::is_blank;

pub const ITEMS_TABLE: &str = "items";
pub const RECIPES_TABLE: &str = "recipes";

/// Parsed rows plus the header they were read under, for reports that echo
/// the source columns.
#[derive(Debug, Clone)]
pub struct CsvTable<T> {
    pub headers: Vec<String>,
    pub rows: Vec<T>,
}

struct RawTable {
    headers: Vec<String>,
    records: Vec<Vec<String>>,
}

fn read_table(table: &str, csv_data: &str) -> Result<RawTable, AuditError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_data.as_bytes());

    let csv_err = |e: csv::Error| AuditError::Csv {
        table: table.into(),
        message: e.to_string(),
    };

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        records.push(record.iter().map(|v| v.to_string()).collect());
    }
    Ok(RawTable { headers, records })
}

fn column_index(table: &str, headers: &[String], name: &str) -> Result<usize, AuditError> {
    headers
        .iter()
        .position(|h| h == name.trim())
        .ok_or_else(|| AuditError::MissingColumn {
            table: table.into(),
            column: name.into(),
        })
}

/// Index of an optional column; absent display columns are tolerated.
fn optional_index(table: &str, headers: &[String], name: Option<&str>) -> Option<usize> {
    let name = name?;
    let idx = headers.iter().position(|h| h == name.trim());
    if idx.is_none() {
        log::warn!("{table} table: column '{name}' not found, left blank");
    }
    idx
}

fn cell(record: &[String], idx: usize) -> String {
    record.get(idx).cloned().unwrap_or_default()
}

/// Identity cell, or the 1-based row number when unmapped or blank.
fn row_id(record: &[String], idx: Option<usize>, row: usize) -> String {
    match idx.map(|i| cell(record, i)) {
        Some(id) if !is_blank(&id) => id.trim().to_string(),
        _ => row.to_string(),
    }
}

pub fn load_items_csv(csv_data: &str, columns: &ColumnsConfig) -> Result<CsvTable<ItemRecord>, AuditError> {
    let raw = read_table(ITEMS_TABLE, csv_data)?;
    let col = &columns.items;
    let idx = |name: &str| column_index(ITEMS_TABLE, &raw.headers, name);

    let id_idx = match &col.id {
        Some(id) => Some(idx(id)?),
        None => None,
    };
    let name_idx = idx(&col.name)?;
    let uom_idx = idx(&col.uom)?;
    let size_idx = idx(&col.size)?;
    let price_idx = idx(&col.price)?;
    let tax_idx = idx(&col.tax_rate)?;
    let code_idx = idx(&col.supplier_code)?;
    let supplier_idx = optional_index(ITEMS_TABLE, &raw.headers, col.supplier.as_deref());

    let rows = raw
        .records
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            let row = i + 1;
            ItemRecord {
                id: row_id(&record, id_idx, row),
                row,
                name: cell(&record, name_idx),
                uom: cell(&record, uom_idx),
                size: cell(&record, size_idx),
                price: cell(&record, price_idx),
                tax_rate: cell(&record, tax_idx),
                supplier_code: cell(&record, code_idx),
                supplier: supplier_idx.map(|s| cell(&record, s)).filter(|s| !is_blank(s)),
                raw_fields: record,
            }
        })
        .collect::<Vec<_>>();

    log::info!("loaded {} items", rows.len());
    Ok(CsvTable {
        headers: raw.headers,
        rows,
    })
}

/// Column indexes of one ingredient slot. Any of the three may be absent.
#[derive(Debug, Default)]
struct SlotColumns {
    name: Option<usize>,
    quantity: Option<usize>,
    uom: Option<usize>,
}

pub fn load_recipes_csv(
    csv_data: &str,
    columns: &ColumnsConfig,
) -> Result<CsvTable<RecipeRecord>, AuditError> {
    let raw = read_table(RECIPES_TABLE, csv_data)?;
    let col = &columns.recipes;

    let id_idx = match &col.id {
        Some(id) => Some(column_index(RECIPES_TABLE, &raw.headers, id)?),
        None => None,
    };
    let name_idx = optional_index(RECIPES_TABLE, &raw.headers, col.name.as_deref());

    let mut slots: BTreeMap<usize, SlotColumns> = BTreeMap::new();
    for (i, header) in raw.headers.iter().enumerate() {
        if let Some(n) = RecipeColumns::match_slot(&col.ingredient_name, header) {
            slots.entry(n).or_default().name.get_or_insert(i);
        } else if let Some(n) = RecipeColumns::match_slot(&col.quantity, header) {
            slots.entry(n).or_default().quantity.get_or_insert(i);
        } else if let Some(n) = RecipeColumns::match_slot(&col.uom, header) {
            slots.entry(n).or_default().uom.get_or_insert(i);
        }
    }
    if slots.is_empty() {
        return Err(AuditError::MissingColumn {
            table: RECIPES_TABLE.into(),
            column: RecipeColumns::slot_column(&col.ingredient_name, 1),
        });
    }
    log::debug!("recipes table: {} ingredient slots", slots.len());

    let rows = raw
        .records
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            let row = i + 1;
            let get = |idx: Option<usize>| idx.map(|i| cell(&record, i)).unwrap_or_default();
            let lines = slots
                .iter()
                .map(|(&slot, c)| IngredientLineInput {
                    slot,
                    name: get(c.name),
                    quantity: get(c.quantity),
                    uom: get(c.uom),
                })
                .filter(|l| !(is_blank(&l.name) && is_blank(&l.quantity) && is_blank(&l.uom)))
                .collect();
            RecipeRecord {
                id: row_id(&record, id_idx, row),
                row,
                name: name_idx.map(|n| cell(&record, n)).filter(|n| !is_blank(n)),
                lines,
                raw_fields: record,
            }
        })
        .collect::<Vec<_>>();

    log::info!("loaded {} recipes", rows.len());
    Ok(CsvTable {
        headers: raw.headers,
        rows,
    })
}
