use crate::config::{AuditConfig, MagnitudeBounds};
use crate::error::UomError;
use crate::model::{Check, Field, IncompatibleReason, UomConsistency, ValidationFlagSet};
use crate::parse::{is_blank, Parsed};
use crate::units::UomRegistry;
use crate::validate::magnitude_issue;

/// Classifies a resolved line's unit against its catalog item's unit.
pub struct UomConsistencyChecker<'a> {
    registry: &'a UomRegistry,
    bounds: &'a MagnitudeBounds,
}

impl<'a> UomConsistencyChecker<'a> {
    pub fn new(config: &'a AuditConfig, registry: &'a UomRegistry) -> Self {
        Self {
            registry,
            bounds: &config.bounds.recipe_quantity,
        }
    }

    /// Unit problems are reported before quantity problems.
    pub fn classify(&self, quantity: Parsed, line_uom: &str, item_uom: &str) -> UomConsistency {
        if is_blank(line_uom) {
            return incompatible(IncompatibleReason::MissingLineUnit, "line unit is blank".into());
        }
        if is_blank(item_uom) {
            return incompatible(IncompatibleReason::MissingItemUnit, "item unit is blank".into());
        }

        let factor = match self.registry.factor(line_uom, item_uom) {
            Ok(factor) => factor,
            Err(UomError::UnknownUnit(unit)) => {
                let reason = if self.registry.is_known(line_uom) {
                    IncompatibleReason::UnknownItemUnit
                } else {
                    IncompatibleReason::UnknownLineUnit
                };
                return incompatible(reason, format!("unknown unit '{unit}'"));
            }
            Err(e @ UomError::IncompatibleUnits { .. }) => {
                return incompatible(IncompatibleReason::FamilyMismatch, e.to_string());
            }
        };

        match quantity {
            Parsed::Blank => {
                return incompatible(IncompatibleReason::MissingQuantity, "quantity is blank".into())
            }
            Parsed::Invalid => {
                return incompatible(
                    IncompatibleReason::NonNumericQuantity,
                    "quantity is not a number".into(),
                )
            }
            Parsed::Number(q) if q <= 0.0 => {
                return incompatible(
                    IncompatibleReason::NonPositiveQuantity,
                    format!("quantity {q} is not positive"),
                )
            }
            Parsed::Number(_) => {}
        }

        if self.registry.canonical(line_uom) == self.registry.canonical(item_uom) {
            UomConsistency::Identical
        } else {
            UomConsistency::Convertible { factor }
        }
    }

    /// UNREASONABLE_QUANTITY on the line when quantity and unit are both
    /// usable and out of bounds. Independent of resolution.
    pub fn check_quantity(&self, quantity: Option<f64>, uom: &str, flags: &mut ValidationFlagSet) {
        let Some(q) = quantity else { return };
        if !self.registry.is_known(uom) {
            return;
        }
        if let Some(message) = magnitude_issue(q, uom, self.bounds, self.registry) {
            flags.insert(Check::UnreasonableQuantity, Field::Quantity, message);
        }
    }
}

fn incompatible(reason: IncompatibleReason, detail: String) -> UomConsistency {
    UomConsistency::Incompatible { reason, detail }
}
