//! Probable duplicate catalog entries.
//!
//! Every pair of named items is scored (no blocking). A pair becomes an edge
//! when the name score clears the threshold and enough supplementary signals
//! hold; clusters are the connected components of that graph.

use crate::config::{AuditConfig, DuplicateConfig, Signal};
use crate::model::{ClusterMember, DuplicateCluster, ItemRecord, PairEvidence, SignalMatch};
use crate::parse::{parse_number, NumberFormat};
use crate::similarity::{normalize_name, score};
use crate::units::{UnitFamily, UomRegistry};

/// Per-item values read once before the O(n²) pass.
struct Prepared {
    named: bool,
    supplier_code: Option<String>,
    size_base: Option<(f64, UnitFamily)>,
    price: Option<f64>,
}

pub struct DuplicateDetector<'a> {
    config: &'a DuplicateConfig,
    registry: &'a UomRegistry,
    numbers: &'a NumberFormat,
}

impl<'a> DuplicateDetector<'a> {
    pub fn new(config: &'a AuditConfig, registry: &'a UomRegistry) -> Self {
        Self {
            config: &config.duplicates,
            registry,
            numbers: &config.numbers,
        }
    }

    /// Clusters in order of first member. Items with blank names never join.
    pub fn detect(&self, items: &[ItemRecord]) -> Vec<DuplicateCluster> {
        let prepared: Vec<Prepared> = items.iter().map(|item| self.prepare(item)).collect();
        let mut forest = DisjointSet::new(items.len());
        let mut edges: Vec<(usize, usize, PairEvidence)> = Vec::new();
        let mut compared = 0usize;

        for i in 0..items.len() {
            if !prepared[i].named {
                continue;
            }
            for j in (i + 1)..items.len() {
                if !prepared[j].named {
                    continue;
                }
                compared += 1;
                let name_score = score(&items[i].name, &items[j].name, self.config.scorer);
                if name_score < self.config.name_threshold {
                    continue;
                }
                let evidence = self.pair_evidence(&items[i], &items[j], &prepared[i], &prepared[j], name_score);
                if self.is_candidate(&evidence) {
                    log::debug!(
                        "duplicate edge: {} ~ {} (name {:.2}, signals {:?})",
                        evidence.left,
                        evidence.right,
                        evidence.name_score,
                        evidence.matched_signals
                    );
                    forest.union(i, j);
                    edges.push((i, j, evidence));
                }
            }
        }

        let clusters = build_clusters(items, &mut forest, edges);
        log::info!(
            "duplicates: {compared} pairs compared, {} clusters",
            clusters.len()
        );
        clusters
    }

    /// Full evidence for one pair, whether or not it would become an edge.
    pub fn evidence(&self, left: &ItemRecord, right: &ItemRecord) -> PairEvidence {
        let name_score = score(&left.name, &right.name, self.config.scorer);
        self.pair_evidence(left, right, &self.prepare(left), &self.prepare(right), name_score)
    }

    pub fn is_candidate(&self, evidence: &PairEvidence) -> bool {
        evidence.name_score >= self.config.name_threshold
            && evidence.matched_signals.len() >= self.config.min_signals
    }

    fn prepare(&self, item: &ItemRecord) -> Prepared {
        let code = item.supplier_code.trim().to_lowercase();
        let size_base = parse_number(&item.size, self.numbers)
            .value()
            .and_then(|size| self.registry.to_base(size, &item.uom).ok());
        Prepared {
            named: !normalize_name(&item.name).is_empty(),
            supplier_code: (!code.is_empty()).then_some(code),
            size_base,
            price: parse_number(&item.price, self.numbers).value(),
        }
    }

    fn pair_evidence(
        &self,
        left: &ItemRecord,
        right: &ItemRecord,
        a: &Prepared,
        b: &Prepared,
        name_score: f64,
    ) -> PairEvidence {
        let supplier = match (&a.supplier_code, &b.supplier_code) {
            (Some(x), Some(y)) if x == y => SignalMatch::Match,
            (Some(_), Some(_)) => SignalMatch::NoMatch,
            _ => SignalMatch::NotComparable,
        };
        let size = match (a.size_base, b.size_base) {
            (Some((x, fx)), Some((y, fy))) if fx == fy => within(x, y, self.config.tol_size),
            _ => SignalMatch::NotComparable,
        };
        let price = match (a.price, b.price) {
            (Some(x), Some(y)) => within(x, y, self.config.tol_price),
            _ => SignalMatch::NotComparable,
        };

        let matched_signals = self
            .config
            .signals
            .iter()
            .copied()
            .filter(|signal| match signal {
                Signal::Supplier => supplier.holds(),
                Signal::Size => size.holds(),
                Signal::Price => price.holds(),
            })
            .collect();

        PairEvidence {
            left: left.id.clone(),
            right: right.id.clone(),
            left_row: left.row,
            right_row: right.row,
            name_score,
            supplier,
            size,
            price,
            matched_signals,
        }
    }
}

/// Relative tolerance against the larger magnitude. Two zeros match.
fn within(a: f64, b: f64, tolerance: f64) -> SignalMatch {
    let scale = a.abs().max(b.abs());
    if scale == 0.0 || (a - b).abs() <= tolerance * scale {
        SignalMatch::Match
    } else {
        SignalMatch::NoMatch
    }
}

fn build_clusters(
    items: &[ItemRecord],
    forest: &mut DisjointSet,
    edges: Vec<(usize, usize, PairEvidence)>,
) -> Vec<DuplicateCluster> {
    // root -> member indices; roots are the smallest index of each component
    let mut groups: std::collections::BTreeMap<usize, Vec<usize>> = std::collections::BTreeMap::new();
    for i in 0..items.len() {
        groups.entry(forest.find(i)).or_default().push(i);
    }

    let mut clusters: Vec<DuplicateCluster> = Vec::new();
    let mut cluster_of_root = std::collections::BTreeMap::new();
    for (root, members) in groups {
        if members.len() < 2 {
            continue;
        }
        cluster_of_root.insert(root, clusters.len());
        clusters.push(DuplicateCluster {
            cluster_id: clusters.len() + 1,
            members: members
                .iter()
                .map(|&i| ClusterMember {
                    item_index: i,
                    item_id: items[i].id.clone(),
                    row: items[i].row,
                    name: items[i].name.clone(),
                })
                .collect(),
            edges: Vec::new(),
        });
    }

    for (i, _, evidence) in edges {
        if let Some(&idx) = cluster_of_root.get(&forest.find(i)) {
            clusters[idx].edges.push(evidence);
        }
    }
    clusters
}

/// Union-find keeping the smallest index as each component's root.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[x] != root {
            let next = self.parent[x];
            self.parent[x] = root;
            x = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            let (low, high) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[high] = low;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, name: &str, code: &str, size: &str, uom: &str, price: &str) -> ItemRecord {
        ItemRecord {
            id: id.into(),
            row: id.parse().unwrap_or(0),
            name: name.into(),
            uom: uom.into(),
            size: size.into(),
            price: price.into(),
            tax_rate: "0".into(),
            supplier_code: code.into(),
            supplier: None,
            raw_fields: Vec::new(),
        }
    }

    fn detect(config: &AuditConfig, items: &[ItemRecord]) -> Vec<DuplicateCluster> {
        let registry = config.registry().unwrap();
        DuplicateDetector::new(config, &registry).detect(items)
    }

    #[test]
    fn olive_oil_pair_clusters() {
        let items = vec![
            item("1", "Olive Oil Extra Virgin", "S1", "1000", "ml", "8.00"),
            item("2", "Olive Oil, X-Virgin", "S1", "1000", "ml", "8.05"),
            item("3", "Sugar", "S2", "1", "kg", "1.10"),
        ];
        let clusters = detect(&AuditConfig::default(), &items);
        assert_eq!(clusters.len(), 1);
        let cluster = &clusters[0];
        assert_eq!(cluster.cluster_id, 1);
        let ids: Vec<_> = cluster.members.iter().map(|m| m.item_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        let edge = &cluster.edges[0];
        assert_eq!(edge.supplier, SignalMatch::Match);
        assert_eq!(edge.size, SignalMatch::Match);
        assert_eq!(edge.price, SignalMatch::Match);
        assert!(edge.name_score >= 85.0);
    }

    #[test]
    fn name_match_alone_is_not_enough() {
        let items = vec![
            item("1", "Whole Milk", "10", "1", "l", "1.00"),
            item("2", "Whole Milk", "20", "12", "ea", "9.00"),
        ];
        assert!(detect(&AuditConfig::default(), &items).is_empty());
    }

    #[test]
    fn size_compares_in_base_unit() {
        let items = vec![
            item("1", "Flour T55", "10", "1", "kg", "1.00"),
            item("2", "Flour T55", "20", "1000", "g", "5.00"),
        ];
        let clusters = detect(&AuditConfig::default(), &items);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].edges[0].size, SignalMatch::Match);
        assert_eq!(clusters[0].edges[0].supplier, SignalMatch::NoMatch);
    }

    #[test]
    fn cross_family_size_is_not_comparable() {
        let config = AuditConfig::default();
        let registry = config.registry().unwrap();
        let detector = DuplicateDetector::new(&config, &registry);
        let ev = detector.evidence(
            &item("1", "Cream", "", "1", "l", ""),
            &item("2", "Cream", "", "1", "kg", ""),
        );
        assert_eq!(ev.size, SignalMatch::NotComparable);
        assert_eq!(ev.supplier, SignalMatch::NotComparable);
        assert_eq!(ev.price, SignalMatch::NotComparable);
        assert!(!detector.is_candidate(&ev));
    }

    #[test]
    fn clusters_are_transitive() {
        // 1~2 on price, 2~3 on supplier; 1 and 3 share no signal
        let items = vec![
            item("1", "Tomato Paste", "10", "400", "g", "2.00"),
            item("2", "Tomato Paste Tin", "20", "800", "g", "2.00"),
            item("3", "Paste Tomato Tin", "20", "", "", "7.00"),
        ];
        let clusters = detect(&AuditConfig::default(), &items);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members.len(), 3);
        assert_eq!(clusters[0].edges.len(), 2);
    }

    #[test]
    fn min_signals_policy() {
        let items = vec![
            item("1", "Butter", "10", "250", "g", "2.00"),
            item("2", "Butter", "10", "500", "g", "3.80"),
        ];
        assert_eq!(detect(&AuditConfig::default(), &items).len(), 1);

        let mut config = AuditConfig::default();
        config.duplicates.min_signals = 2;
        assert!(detect(&config, &items).is_empty());

        let mut config = AuditConfig::default();
        config.duplicates.signals = vec![Signal::Size];
        assert!(detect(&config, &items).is_empty());
    }

    #[test]
    fn blank_names_never_cluster() {
        let items = vec![
            item("1", "", "10", "1", "kg", "1.00"),
            item("2", "  ", "10", "1", "kg", "1.00"),
        ];
        assert!(detect(&AuditConfig::default(), &items).is_empty());
    }

    #[test]
    fn zero_prices_match() {
        assert_eq!(within(0.0, 0.0, 0.01), SignalMatch::Match);
        assert_eq!(within(8.0, 8.05, 0.01), SignalMatch::Match);
        assert_eq!(within(8.0, 8.5, 0.01), SignalMatch::NoMatch);
    }

    #[test]
    fn clusters_ordered_by_first_member() {
        let items = vec![
            item("1", "Rice", "1", "1", "kg", "2"),
            item("2", "Basmati Rice", "2", "5", "kg", "9"),
            item("3", "Salt", "3", "1", "kg", "0.5"),
            item("4", "Basmati Rice", "2", "5", "kg", "9"),
            item("5", "Salt", "3", "1", "kg", "0.5"),
        ];
        let mut config = AuditConfig::default();
        config.duplicates.scorer = crate::similarity::Scorer::Ratio;
        let clusters = detect(&config, &items);
        let firsts: Vec<_> = clusters.iter().map(|c| c.members[0].item_id.as_str()).collect();
        assert_eq!(firsts, vec!["2", "3"]);
        assert_eq!(clusters[1].cluster_id, 2);
    }
}
