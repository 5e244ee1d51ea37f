use crate::model::{
    AuditSummary, DuplicateCluster, ItemAudit, OutlierVerdict, RecipeAudit, ResolutionStatus, UomConsistency,
};

/// Compute run-level counts from per-item and per-recipe results.
pub fn compute_summary(items: &[ItemAudit], duplicates: &[DuplicateCluster], recipes: &[RecipeAudit]) -> AuditSummary {
    let mut summary = AuditSummary {
        items: items.len(),
        duplicate_clusters: duplicates.len(),
        items_in_clusters: duplicates.iter().map(|c| c.members.len()).sum(),
        recipes: recipes.len(),
        ..Default::default()
    };

    for item in items {
        if item.flags.is_clean() {
            summary.clean_items += 1;
        } else {
            summary.flagged_items += 1;
        }
        for flag in item.flags.iter() {
            *summary.flag_counts.entry(flag.check.to_string()).or_default() += 1;
        }
    }

    for recipe in recipes {
        for line in &recipe.lines {
            summary.lines += 1;
            match line.resolution.status {
                ResolutionStatus::Exact => summary.resolved_exact += 1,
                ResolutionStatus::Fuzzy => summary.resolved_fuzzy += 1,
                ResolutionStatus::Unresolved => summary.unresolved += 1,
            }
            match line.consistency {
                UomConsistency::Identical => summary.uom_identical += 1,
                UomConsistency::Convertible { .. } => summary.uom_convertible += 1,
                UomConsistency::Incompatible { .. } => summary.uom_incompatible += 1,
                UomConsistency::NotChecked => {}
            }
            for flag in line.flags.iter() {
                *summary.flag_counts.entry(flag.check.to_string()).or_default() += 1;
            }
        }

        summary.priced_lines += recipe.cost.priced_lines;
        summary.excluded_lines += recipe.cost.excluded_lines;
        match recipe.cost.verdict {
            OutlierVerdict::CostUndetermined => summary.undetermined_recipes += 1,
            OutlierVerdict::CostOutlier { .. } => {
                summary.costed_recipes += 1;
                summary.cost_outliers += 1;
            }
            OutlierVerdict::Normal | OutlierVerdict::InsufficientData => summary.costed_recipes += 1,
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Check, Field, OutlierReason, RecipeCostSummary, ValidationFlagSet};

    fn item_audit(flags: ValidationFlagSet) -> ItemAudit {
        ItemAudit {
            item_id: "1".into(),
            row: 1,
            name: "x".into(),
            flags,
            duplicate_cluster: None,
        }
    }

    fn recipe_audit(verdict: OutlierVerdict, total: Option<f64>) -> RecipeAudit {
        RecipeAudit {
            recipe_id: "R".into(),
            row: 1,
            name: None,
            lines: Vec::new(),
            cost: RecipeCostSummary {
                recipe_id: "R".into(),
                name: None,
                total,
                priced_lines: usize::from(total.is_some()),
                excluded_lines: 1,
                verdict,
            },
        }
    }

    #[test]
    fn counts_items_and_flags() {
        let mut flagged = ValidationFlagSet::new();
        flagged.insert(Check::Missing, Field::Price, "blank");
        flagged.insert(Check::Missing, Field::Size, "blank");
        flagged.insert(Check::InvalidUom, Field::Uom, "oz");
        let items = vec![item_audit(ValidationFlagSet::new()), item_audit(flagged)];

        let summary = compute_summary(&items, &[], &[]);
        assert_eq!(summary.items, 2);
        assert_eq!(summary.clean_items, 1);
        assert_eq!(summary.flagged_items, 1);
        assert_eq!(summary.flag_counts["MISSING"], 2);
        assert_eq!(summary.flag_counts["INVALID_UOM"], 1);
    }

    #[test]
    fn counts_recipe_verdicts() {
        let recipes = vec![
            recipe_audit(OutlierVerdict::Normal, Some(10.0)),
            recipe_audit(
                OutlierVerdict::CostOutlier {
                    reasons: vec![OutlierReason::AbsoluteCeiling],
                },
                Some(900.0),
            ),
            recipe_audit(OutlierVerdict::CostUndetermined, None),
        ];
        let summary = compute_summary(&[], &[], &recipes);
        assert_eq!(summary.recipes, 3);
        assert_eq!(summary.costed_recipes, 2);
        assert_eq!(summary.cost_outliers, 1);
        assert_eq!(summary.undetermined_recipes, 1);
        assert_eq!(summary.priced_lines, 2);
        assert_eq!(summary.excluded_lines, 3);
    }

    #[test]
    fn insufficient_data_still_costed() {
        let summary = compute_summary(&[], &[], &[recipe_audit(OutlierVerdict::InsufficientData, Some(1.0))]);
        assert_eq!(summary.lines, 0);
        assert_eq!(summary.costed_recipes, 1);
    }
}
