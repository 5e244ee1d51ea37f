use std::collections::HashMap;

use crate::config::{AuditConfig, ResolveConfig};
use crate::model::{ItemRecord, Resolution, ResolutionStatus};
use crate::similarity::score;

/// Trim, lowercase and collapse inner whitespace.
pub fn clean_name(raw: &str) -> String {
    raw.split_whitespace()
        .map(|token| token.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Maps recipe ingredient names onto catalog items.
///
/// Exact (cleaned) name match wins; otherwise the best fuzzy score at or
/// above the threshold. Ties go to the earliest catalog row.
pub struct IngredientResolver<'a> {
    items: &'a [ItemRecord],
    config: &'a ResolveConfig,
    /// cleaned name -> first item index carrying it
    exact: HashMap<String, usize>,
}

impl<'a> IngredientResolver<'a> {
    pub fn new(config: &'a AuditConfig, items: &'a [ItemRecord]) -> Self {
        let mut exact = HashMap::new();
        for (idx, item) in items.iter().enumerate() {
            let cleaned = clean_name(&item.name);
            if !cleaned.is_empty() {
                exact.entry(cleaned).or_insert(idx);
            }
        }
        Self {
            items,
            config: &config.resolve,
            exact,
        }
    }

    pub fn resolve(&self, name: &str) -> Resolution {
        let cleaned = clean_name(name);
        if cleaned.is_empty() {
            return unresolved(0.0, None);
        }

        if let Some(&idx) = self.exact.get(&cleaned) {
            return self.resolved(ResolutionStatus::Exact, idx, 100.0);
        }

        let mut best: Option<(usize, f64)> = None;
        for (idx, item) in self.items.iter().enumerate() {
            let s = score(&cleaned, &item.name, self.config.scorer);
            if s > 0.0 && best.map_or(true, |(_, top)| s > top) {
                best = Some((idx, s));
            }
        }

        match best {
            Some((idx, s)) if s >= self.config.threshold => {
                log::debug!("resolved '{name}' -> '{}' ({s:.2})", self.items[idx].name);
                self.resolved(ResolutionStatus::Fuzzy, idx, s)
            }
            Some((idx, s)) => unresolved(s, Some(self.items[idx].name.clone())),
            None => unresolved(0.0, None),
        }
    }

    fn resolved(&self, status: ResolutionStatus, idx: usize, score: f64) -> Resolution {
        let item = &self.items[idx];
        Resolution {
            status,
            item_index: Some(idx),
            item_id: Some(item.id.clone()),
            item_name: Some(item.name.clone()),
            score,
            nearest: None,
        }
    }
}

fn unresolved(score: f64, nearest: Option<String>) -> Resolution {
    Resolution {
        status: ResolutionStatus::Unresolved,
        item_index: None,
        item_id: None,
        item_name: None,
        score,
        nearest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(names: &[&str]) -> Vec<ItemRecord> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| ItemRecord {
                id: format!("I{}", i + 1),
                row: i + 1,
                name: name.to_string(),
                ..ItemRecord::default()
            })
            .collect()
    }

    #[test]
    fn exact_match_ignores_case_and_spacing() {
        let items = catalog(&["Plain  Flour", "Sugar"]);
        let config = AuditConfig::default();
        let resolver = IngredientResolver::new(&config, &items);
        let r = resolver.resolve("  plain flour ");
        assert_eq!(r.status, ResolutionStatus::Exact);
        assert_eq!(r.item_id.as_deref(), Some("I1"));
        assert_eq!(r.score, 100.0);
    }

    #[test]
    fn exact_match_prefers_first_row() {
        let items = catalog(&["Butter", "Sugar", "butter"]);
        let config = AuditConfig::default();
        let r = IngredientResolver::new(&config, &items).resolve("BUTTER");
        assert_eq!(r.item_index, Some(0));
    }

    #[test]
    fn fuzzy_match_above_threshold() {
        let items = catalog(&["Sugar", "Olive Oil Extra Virgin"]);
        let config = AuditConfig::default();
        let r = IngredientResolver::new(&config, &items).resolve("Extra Virgin Olive Oil");
        assert_eq!(r.status, ResolutionStatus::Fuzzy);
        assert_eq!(r.item_id.as_deref(), Some("I2"));
        assert_eq!(r.score, 100.0);
    }

    #[test]
    fn below_threshold_is_unresolved_with_nearest() {
        let items = catalog(&["Parmesan", "Mozzarella"]);
        let config = AuditConfig::default();
        let r = IngredientResolver::new(&config, &items).resolve("Parmigiano");
        assert_eq!(r.status, ResolutionStatus::Unresolved);
        assert!(r.item_id.is_none());
        assert_eq!(r.nearest.as_deref(), Some("Parmesan"));
        assert!(r.score < 90.0);
    }

    #[test]
    fn fuzzy_ties_go_to_first_row() {
        let items = catalog(&["Cherry Tomatoes", "Cherry Tomatoes!"]);
        let config = AuditConfig::default();
        let r = IngredientResolver::new(&config, &items).resolve("cherry tomatoe");
        assert_eq!(r.status, ResolutionStatus::Fuzzy);
        assert_eq!(r.item_index, Some(0));
    }

    #[test]
    fn blank_name_is_unresolved() {
        let items = catalog(&["Salt"]);
        let config = AuditConfig::default();
        let r = IngredientResolver::new(&config, &items).resolve("   ");
        assert!(!r.is_resolved());
        assert_eq!(r.score, 0.0);
    }

    #[test]
    fn repeated_runs_agree() {
        let items = catalog(&["Cream Cheese", "Cream", "Sour Cream", "Cheddar"]);
        let config = AuditConfig::default();
        let resolver = IngredientResolver::new(&config, &items);
        let first = resolver.resolve("cream chese");
        for _ in 0..5 {
            assert_eq!(resolver.resolve("cream chese"), first);
        }
    }
}
