use crate::config::AuditConfig;
use crate::model::{IngredientLine, ItemRecord, OutlierVerdict, RecipeCostSummary, UomConsistency, Unpriced};
use crate::parse::{parse_number, parse_percentage, NumberFormat, Parsed};
use crate::units::UomRegistry;

/// Line cost = quantity converted into the item's unit × item unit price.
pub struct CostEstimator<'a> {
    registry: &'a UomRegistry,
    numbers: &'a NumberFormat,
    include_tax: bool,
}

impl<'a> CostEstimator<'a> {
    pub fn new(config: &'a AuditConfig, registry: &'a UomRegistry) -> Self {
        Self {
            registry,
            numbers: &config.numbers,
            include_tax: config.cost.include_tax,
        }
    }

    /// Cost of one line, or why it cannot be priced.
    pub fn line_cost(
        &self,
        quantity: Option<f64>,
        line_uom: &str,
        consistency: &UomConsistency,
        item: Option<&ItemRecord>,
    ) -> Result<f64, Unpriced> {
        let item = item.ok_or(Unpriced::Unresolved)?;
        if !consistency.is_usable() {
            return Err(Unpriced::UomIncompatible);
        }
        // usable consistency implies a positive parsed quantity
        let qty = quantity.ok_or(Unpriced::UomIncompatible)?;

        let price = match parse_number(&item.price, self.numbers) {
            Parsed::Number(p) => p,
            Parsed::Blank => return Err(Unpriced::PriceMissing),
            Parsed::Invalid => return Err(Unpriced::PriceNotNumeric),
        };
        let price = if self.include_tax {
            match parse_percentage(&item.tax_rate, self.numbers) {
                Parsed::Number(rate) => price * (1.0 + rate),
                _ => {
                    log::debug!("item {}: tax rate unusable, pricing excl. tax", item.id);
                    price
                }
            }
        } else {
            price
        };

        let in_item_unit = self
            .registry
            .convert(qty, line_uom, &item.uom)
            .map_err(|_| Unpriced::UomIncompatible)?;
        Ok(in_item_unit * price)
    }
}

/// Sum defined line costs. No priced line leaves the total undetermined.
pub fn summarize(recipe_id: &str, name: Option<&str>, lines: &[IngredientLine]) -> RecipeCostSummary {
    let costs: Vec<f64> = lines.iter().filter_map(|l| l.cost).collect();
    let total = if costs.is_empty() {
        None
    } else {
        Some(costs.iter().sum())
    };
    RecipeCostSummary {
        recipe_id: recipe_id.to_string(),
        name: name.map(str::to_string),
        total,
        priced_lines: costs.len(),
        excluded_lines: lines.len() - costs.len(),
        verdict: if total.is_some() {
            OutlierVerdict::Normal
        } else {
            OutlierVerdict::CostUndetermined
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IncompatibleReason, Resolution, ResolutionStatus, ValidationFlagSet};
    use crate::units::UnitFamily;

    fn flour() -> ItemRecord {
        ItemRecord {
            id: "F1".into(),
            row: 1,
            name: "Flour".into(),
            uom: "g".into(),
            size: "1000".into(),
            price: "0.002".into(),
            tax_rate: "10%".into(),
            supplier_code: "1".into(),
            ..ItemRecord::default()
        }
    }

    fn line(cost: Option<f64>) -> IngredientLine {
        IngredientLine {
            slot: 1,
            name: "x".into(),
            quantity_raw: "1".into(),
            quantity: Some(1.0),
            uom: "g".into(),
            family: UnitFamily::Mass,
            resolution: Resolution {
                status: ResolutionStatus::Unresolved,
                item_index: None,
                item_id: None,
                item_name: None,
                score: 0.0,
                nearest: None,
            },
            consistency: UomConsistency::NotChecked,
            flags: ValidationFlagSet::new(),
            cost,
            unpriced: None,
        }
    }

    #[test]
    fn two_kg_of_flour_costs_four() {
        let config = AuditConfig::default();
        let registry = config.registry().unwrap();
        let estimator = CostEstimator::new(&config, &registry);
        let consistency = UomConsistency::Convertible { factor: 1000.0 };
        let cost = estimator.line_cost(Some(2.0), "kg", &consistency, Some(&flour())).unwrap();
        assert!((cost - 4.0).abs() < 1e-9, "cost was {cost}");
    }

    #[test]
    fn tax_grosses_up_when_enabled() {
        let mut config = AuditConfig::default();
        config.cost.include_tax = true;
        let registry = config.registry().unwrap();
        let estimator = CostEstimator::new(&config, &registry);
        let cost = estimator
            .line_cost(Some(1000.0), "g", &UomConsistency::Identical, Some(&flour()))
            .unwrap();
        assert!((cost - 2.2).abs() < 1e-9, "cost was {cost}");
    }

    #[test]
    fn unpriceable_lines() {
        let config = AuditConfig::default();
        let registry = config.registry().unwrap();
        let estimator = CostEstimator::new(&config, &registry);
        let incompatible = UomConsistency::Incompatible {
            reason: IncompatibleReason::FamilyMismatch,
            detail: String::new(),
        };

        assert_eq!(
            estimator.line_cost(Some(1.0), "g", &UomConsistency::NotChecked, None),
            Err(Unpriced::Unresolved)
        );
        assert_eq!(
            estimator.line_cost(Some(1.0), "ml", &incompatible, Some(&flour())),
            Err(Unpriced::UomIncompatible)
        );

        let mut no_price = flour();
        no_price.price = "".into();
        assert_eq!(
            estimator.line_cost(Some(1.0), "g", &UomConsistency::Identical, Some(&no_price)),
            Err(Unpriced::PriceMissing)
        );
        no_price.price = "ask".into();
        assert_eq!(
            estimator.line_cost(Some(1.0), "g", &UomConsistency::Identical, Some(&no_price)),
            Err(Unpriced::PriceNotNumeric)
        );
    }

    #[test]
    fn summary_sums_defined_costs() {
        let lines = vec![line(Some(1.5)), line(None), line(Some(2.5))];
        let summary = summarize("R1", Some("Bread"), &lines);
        assert_eq!(summary.total, Some(4.0));
        assert_eq!(summary.priced_lines, 2);
        assert_eq!(summary.excluded_lines, 1);
        assert_eq!(summary.verdict, OutlierVerdict::Normal);
    }

    #[test]
    fn no_priced_lines_is_undetermined_not_zero() {
        let summary = summarize("R2", None, &[line(None), line(None)]);
        assert_eq!(summary.total, None);
        assert_eq!(summary.excluded_lines, 2);
        assert_eq!(summary.verdict, OutlierVerdict::CostUndetermined);

        let empty = summarize("R3", None, &[]);
        assert_eq!(empty.total, None);
    }
}
