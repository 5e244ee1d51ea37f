//! Per-row field checks for catalog items and recipe lines.
//!
//! Every record gets exactly one flag set. Flags never block later stages;
//! each consumer re-reads the raw field and decides for itself.

use crate::config::{AuditConfig, Limit, MagnitudeBounds};
use crate::model::{Check, Field, IngredientLineInput, ItemRecord, ValidationFlagSet};
use crate::parse::{is_blank, is_numeric_code, parse_number, parse_percentage, NumberFormat, Parsed};
use crate::units::UomRegistry;

pub struct FieldValidator<'a> {
    registry: &'a UomRegistry,
    numbers: &'a NumberFormat,
    item_bounds: &'a MagnitudeBounds,
    supplier_code_numeric: bool,
}

impl<'a> FieldValidator<'a> {
    pub fn new(config: &'a AuditConfig, registry: &'a UomRegistry) -> Self {
        Self {
            registry,
            numbers: &config.numbers,
            item_bounds: &config.bounds.item_size,
            supplier_code_numeric: config.validation.supplier_code_numeric,
        }
    }

    pub fn validate_item(&self, item: &ItemRecord) -> ValidationFlagSet {
        let mut flags = ValidationFlagSet::new();

        let size = self.numeric(&mut flags, Field::Size, &item.size, parse_number(&item.size, self.numbers));
        self.numeric(&mut flags, Field::Price, &item.price, parse_number(&item.price, self.numbers));
        self.numeric(
            &mut flags,
            Field::TaxRate,
            &item.tax_rate,
            parse_percentage(&item.tax_rate, self.numbers),
        );

        if is_blank(&item.supplier_code) {
            flags.insert(Check::Missing, Field::SupplierCode, "supplier code is blank");
        } else if self.supplier_code_numeric && !is_numeric_code(&item.supplier_code) {
            flags.insert(
                Check::NotNumeric,
                Field::SupplierCode,
                format!("supplier code '{}' is not all digits", item.supplier_code.trim()),
            );
        }

        let uom_ok = self.unit(&mut flags, &item.uom);

        if let (Some(size), true) = (size, uom_ok) {
            if let Some(message) = magnitude_issue(size, &item.uom, self.item_bounds, self.registry) {
                flags.insert(Check::UnreasonableMagnitude, Field::Size, message);
            }
        }

        flags
    }

    /// Presence and format flags for a recipe line's own fields. Bounds on
    /// the quantity are checked with the UOM consistency pass.
    pub fn validate_line(&self, line: &IngredientLineInput) -> ValidationFlagSet {
        let mut flags = ValidationFlagSet::new();
        if is_blank(&line.name) {
            flags.insert(Check::Missing, Field::Name, "ingredient name is blank");
        }
        self.numeric(
            &mut flags,
            Field::Quantity,
            &line.quantity,
            parse_number(&line.quantity, self.numbers),
        );
        self.unit(&mut flags, &line.uom);
        flags
    }

    /// Flags blank or unparseable values; returns the number when it parsed.
    fn numeric(&self, flags: &mut ValidationFlagSet, field: Field, raw: &str, parsed: Parsed) -> Option<f64> {
        match parsed {
            Parsed::Number(v) => Some(v),
            Parsed::Blank => {
                flags.insert(Check::Missing, field, format!("{field} is blank"));
                None
            }
            Parsed::Invalid => {
                flags.insert(
                    Check::NotNumeric,
                    field,
                    format!("{field} '{}' is not a number", raw.trim()),
                );
                None
            }
        }
    }

    fn unit(&self, flags: &mut ValidationFlagSet, raw: &str) -> bool {
        if is_blank(raw) {
            flags.insert(Check::Missing, Field::Uom, "unit of measure is blank");
            return false;
        }
        if !self.registry.is_known(raw) {
            flags.insert(
                Check::InvalidUom,
                Field::Uom,
                format!("'{}' is not an accepted unit", raw.trim()),
            );
            return false;
        }
        true
    }
}

/// Describe why `value` in `unit` is out of bounds, or `None` when it is
/// plausible. Non-positive values are always out of bounds.
pub(crate) fn magnitude_issue(
    value: f64,
    unit: &str,
    bounds: &MagnitudeBounds,
    registry: &UomRegistry,
) -> Option<String> {
    let canonical = registry.canonical(unit)?;
    if value <= 0.0 {
        return Some(format!("{value} {canonical} is not positive"));
    }
    match bounds.limit_for(canonical, registry)? {
        Limit::Unit(max) if value > max => Some(format!("{value} {canonical} exceeds {max} {canonical}")),
        Limit::Unit(_) => None,
        Limit::Family(max, base) => {
            let (in_base, _) = registry.to_base(value, canonical).ok()?;
            (in_base > max).then(|| format!("{value} {canonical} ({in_base} {base}) exceeds {max} {base}"))
        }
    }
}
