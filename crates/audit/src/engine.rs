use std::collections::HashMap;

use crate::config::AuditConfig;
use crate::consistency::UomConsistencyChecker;
use crate::cost::{summarize, CostEstimator};
use crate::duplicates::DuplicateDetector;
use crate::error::AuditError;
use crate::model::{
    AuditInput, AuditMeta, AuditResult, IngredientLine, ItemAudit, MissingIngredient, RecipeAudit,
    RecipeRecord, UomConsistency,
};
use crate::outliers::OutlierDetector;
use crate::parse::parse_number;
use crate::resolve::{clean_name, IngredientResolver};
use crate::summary::compute_summary;
use crate::units::UomRegistry;
use crate::validate::FieldValidator;

/// Run the full audit. Either a complete result or an error; the config is
/// validated before any row is looked at.
pub fn run(config: &AuditConfig, input: &AuditInput) -> Result<AuditResult, AuditError> {
    config.validate()?;
    let registry = config.registry()?;
    log::info!(
        "audit '{}': {} items, {} recipes, {} units",
        config.name,
        input.items.len(),
        input.recipes.len(),
        registry.len()
    );

    // Items
    let validator = FieldValidator::new(config, &registry);
    let duplicates = DuplicateDetector::new(config, &registry).detect(&input.items);

    let cluster_of_item: HashMap<usize, usize> = duplicates
        .iter()
        .flat_map(|c| c.members.iter().map(move |m| (m.item_index, c.cluster_id)))
        .collect();

    let items: Vec<ItemAudit> = input
        .items
        .iter()
        .enumerate()
        .map(|(index, item)| ItemAudit {
            item_id: item.id.clone(),
            row: item.row,
            name: item.name.clone(),
            flags: validator.validate_item(item),
            duplicate_cluster: cluster_of_item.get(&index).copied(),
        })
        .collect();

    // Recipes
    let resolver = IngredientResolver::new(config, &input.items);
    let checker = UomConsistencyChecker::new(config, &registry);
    let estimator = CostEstimator::new(config, &registry);
    let stages = RecipeStages {
        config,
        registry: &registry,
        input,
        validator: &validator,
        resolver: &resolver,
        checker: &checker,
        estimator: &estimator,
    };

    let mut recipes: Vec<RecipeAudit> = input.recipes.iter().map(|r| stages.audit_recipe(r)).collect();

    // Outliers need every total first
    let mut costs: Vec<_> = recipes.iter().map(|r| r.cost.clone()).collect();
    let cost_stats = OutlierDetector::new(config).apply(&mut costs);
    for (recipe, cost) in recipes.iter_mut().zip(costs) {
        recipe.cost = cost;
    }

    let missing_ingredients = collect_missing(&recipes);
    let summary = compute_summary(&items, &duplicates, &recipes);
    log::info!(
        "audit done: {} flagged items, {} clusters, {} unresolved lines, {} cost outliers",
        summary.flagged_items,
        summary.duplicate_clusters,
        summary.unresolved,
        summary.cost_outliers
    );

    Ok(AuditResult {
        meta: AuditMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            outlier_method: config.outliers.method,
        },
        summary,
        items,
        duplicates,
        recipes,
        missing_ingredients,
        cost_stats,
    })
}

/// Everything a recipe line passes through, borrowed for the run.
struct RecipeStages<'a> {
    config: &'a AuditConfig,
    registry: &'a UomRegistry,
    input: &'a AuditInput,
    validator: &'a FieldValidator<'a>,
    resolver: &'a IngredientResolver<'a>,
    checker: &'a UomConsistencyChecker<'a>,
    estimator: &'a CostEstimator<'a>,
}

impl RecipeStages<'_> {
    fn audit_recipe(&self, recipe: &RecipeRecord) -> RecipeAudit {
        let lines: Vec<IngredientLine> = recipe
            .lines
            .iter()
            .map(|line| {
                let mut flags = self.validator.validate_line(line);
                let parsed = parse_number(&line.quantity, &self.config.numbers);
                let quantity = parsed.value();
                self.checker.check_quantity(quantity, &line.uom, &mut flags);

                let resolution = self.resolver.resolve(&line.name);
                let item = resolution.item_index.and_then(|i| self.input.items.get(i));
                let consistency = match item {
                    Some(item) => self.checker.classify(parsed, &line.uom, &item.uom),
                    None => UomConsistency::NotChecked,
                };
                let (cost, unpriced) = match self.estimator.line_cost(quantity, &line.uom, &consistency, item) {
                    Ok(cost) => (Some(cost), None),
                    Err(reason) => (None, Some(reason)),
                };
                log::debug!(
                    "recipe {} slot {}: {:?} / {} / {:?}",
                    recipe.id,
                    line.slot,
                    resolution.status,
                    consistency.label(),
                    cost
                );

                IngredientLine {
                    slot: line.slot,
                    name: line.name.clone(),
                    quantity_raw: line.quantity.clone(),
                    quantity,
                    uom: line.uom.clone(),
                    family: self.registry.family(&line.uom),
                    resolution,
                    consistency,
                    flags,
                    cost,
                    unpriced,
                }
            })
            .collect();

        let cost = summarize(&recipe.id, recipe.name.as_deref(), &lines);
        RecipeAudit {
            recipe_id: recipe.id.clone(),
            row: recipe.row,
            name: recipe.name.clone(),
            lines,
            cost,
        }
    }
}

fn collect_missing(recipes: &[RecipeAudit]) -> Vec<MissingIngredient> {
    recipes
        .iter()
        .flat_map(|recipe| {
            recipe
                .lines
                .iter()
                .filter(|line| !line.resolution.is_resolved())
                .map(move |line| MissingIngredient {
                    recipe_id: recipe.recipe_id.clone(),
                    recipe_name: recipe.name.clone(),
                    slot: line.slot,
                    ingredient_name: line.name.clone(),
                    cleaned_name: clean_name(&line.name),
                    nearest: line.resolution.nearest.clone(),
                    nearest_score: line.resolution.score,
                })
        })
        .collect()
}
