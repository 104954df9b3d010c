//! Group-by-sum over the combined entry stream.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;

use crate::calendar::ReferenceZone;
use crate::types::{Entry, GroupBy, Product};

pub const UNKNOWN_CATEGORY: &str = "Unknown";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    pub production: f64,
    pub disposal: f64,
    pub entries: usize,
}

impl Totals {
    fn add(&mut self, entry: &Entry<'_>) {
        let qty = sanitize_quantity(entry.id(), entry.quantity());
        match entry {
            Entry::Production(_) => self.production += qty,
            Entry::Disposal(_) => self.disposal += qty,
        }
        self.entries += 1;
    }
}

/// Coerce a stored quantity to a safe, non-negative number.
pub fn sanitize_quantity(entry_id: &str, quantity: f64) -> f64 {
    if quantity.is_finite() && quantity >= 0.0 {
        quantity
    } else {
        tracing::warn!(entry_id, quantity, "coercing invalid quantity to 0");
        0.0
    }
}

/// Group totals kept in first-seen key order. Callers pick an explicit
/// ordering through `sorted_by_key` or `sorted_by_disposal_desc`.
#[derive(Debug, Clone)]
pub struct Aggregation<K> {
    order: Vec<K>,
    totals: HashMap<K, Totals>,
}

impl<K> Default for Aggregation<K> {
    fn default() -> Self {
        Aggregation { order: Vec::new(), totals: HashMap::new() }
    }
}

impl<K: Eq + Hash + Clone> Aggregation<K> {
    fn slot(&mut self, key: K) -> &mut Totals {
        if !self.totals.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.totals.entry(key).or_default()
    }

    pub fn get(&self, key: &K) -> Option<&Totals> {
        self.totals.get(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &Totals)> {
        self.order.iter().filter_map(move |k| self.totals.get(k).map(|t| (k, t)))
    }

    pub fn grand_total(&self) -> Totals {
        self.totals.values().fold(Totals::default(), |mut acc, t| {
            acc.production += t.production;
            acc.disposal += t.disposal;
            acc.entries += t.entries;
            acc
        })
    }
}

impl<K: Eq + Hash + Clone + Ord> Aggregation<K> {
    pub fn sorted_by_key(&self) -> Vec<(K, Totals)> {
        let mut rows: Vec<(K, Totals)> = self.iter().map(|(k, t)| (k.clone(), *t)).collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }

    /// Highest disposal first, ties broken by key ascending.
    pub fn sorted_by_disposal_desc(&self) -> Vec<(K, Totals)> {
        let mut rows: Vec<(K, Totals)> = self.iter().map(|(k, t)| (k.clone(), *t)).collect();
        rows.sort_by(|a, b| {
            b.1.disposal
                .partial_cmp(&a.1.disposal)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        rows
    }
}

/// Sum quantities per key.
pub fn aggregate<'a, K, F>(entries: &[Entry<'a>], mut key_fn: F) -> Aggregation<K>
where
    K: Eq + Hash + Clone,
    F: FnMut(&Entry<'a>) -> K,
{
    let mut agg = Aggregation::default();
    for entry in entries {
        agg.slot(key_fn(entry)).add(entry);
    }
    agg
}

/// Like `aggregate`, but an entry may land in zero or more groups. Each group
/// receives the entry's full quantity.
pub fn aggregate_multi<'a, K, F>(entries: &[Entry<'a>], mut keys_fn: F) -> Aggregation<K>
where
    K: Eq + Hash + Clone,
    F: FnMut(&Entry<'a>) -> Vec<K>,
{
    let mut agg = Aggregation::default();
    for entry in entries {
        for key in keys_fn(entry) {
            agg.slot(key).add(entry);
        }
    }
    agg
}

/// Looks up a product's category by id, falling back to name.
pub struct CategoryLookup {
    by_id: HashMap<String, String>,
    by_name: HashMap<String, String>,
}

impl CategoryLookup {
    pub fn new(products: &[Product]) -> Self {
        let mut by_id = HashMap::new();
        let mut by_name = HashMap::new();
        for p in products {
            by_id.insert(p.id.clone(), p.category.clone());
            by_name.insert(p.name.trim().to_lowercase(), p.category.clone());
        }
        CategoryLookup { by_id, by_name }
    }

    pub fn category_of(&self, entry: &Entry<'_>) -> String {
        self.by_id
            .get(entry.product_id())
            .or_else(|| self.by_name.get(&entry.product_name().trim().to_lowercase()))
            .cloned()
            .unwrap_or_else(|| {
                tracing::warn!(
                    entry_id = entry.id(),
                    product = entry.product_name(),
                    "no catalog product for entry, using Unknown category"
                );
                UNKNOWN_CATEGORY.to_string()
            })
    }
}

/// Aggregate along one of the named grouping dimensions.
///
/// `Date` keys are `YYYY-MM-DD` in the reference zone and skip unreadable
/// dates. `Reason` keys split comma-joined reasons and skip production.
pub fn aggregate_by(
    entries: &[Entry<'_>],
    group: GroupBy,
    products: &[Product],
    zone: &ReferenceZone,
) -> Aggregation<String> {
    match group {
        GroupBy::Product => aggregate(entries, |e| e.product_name().trim().to_string()),
        GroupBy::Shift => aggregate(entries, |e| e.shift().as_str().to_string()),
        GroupBy::Category => {
            let lookup = CategoryLookup::new(products);
            aggregate(entries, |e| lookup.category_of(e))
        }
        GroupBy::Date => aggregate_multi(entries, |e| match zone.to_calendar_date(e.date()) {
            Some(day) => vec![day.format("%Y-%m-%d").to_string()],
            None => {
                tracing::warn!(entry_id = e.id(), raw_date = e.date(), "skipping entry with unreadable date");
                Vec::new()
            }
        }),
        GroupBy::Reason => {
            // Reasons group ignoring case under their first-seen spelling.
            let mut spelling: HashMap<String, String> = HashMap::new();
            aggregate_multi(entries, |e| match e {
                Entry::Disposal(d) => d
                    .reasons()
                    .map(|r| spelling.entry(r.to_lowercase()).or_insert_with(|| r.to_string()).clone())
                    .collect(),
                Entry::Production(_) => Vec::new(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{entries, DisposalEntry, ProductionEntry, Shift};

    fn prod(id: &str, name: &str, qty: f64, shift: Shift) -> ProductionEntry {
        ProductionEntry {
            id: id.into(),
            product_id: name.to_lowercase(),
            product_name: name.into(),
            staff_name: "Ana".into(),
            date: "2024-02-01".into(),
            quantity: qty,
            shift,
            expiration_date: "2024-02-03".into(),
            notes: None,
        }
    }

    fn disp(id: &str, name: &str, qty: f64, reason: &str, date: &str) -> DisposalEntry {
        DisposalEntry {
            id: id.into(),
            product_id: name.to_lowercase(),
            product_name: name.into(),
            staff_name: "Ana".into(),
            date: date.into(),
            quantity: qty,
            shift: Shift::Afternoon,
            reason: reason.into(),
            notes: None,
        }
    }

    #[test]
    fn negative_and_nan_quantities_count_as_zero() {
        let p = vec![prod("a", "Bread", -5.0, Shift::Morning), prod("b", "Bread", f64::NAN, Shift::Morning), prod("c", "Bread", 4.0, Shift::Morning)];
        let all = entries(&p, &[]);
        let agg = aggregate(&all, |e| e.product_name().to_string());
        let t = agg.get(&"Bread".to_string()).unwrap();
        assert_eq!(t.production, 4.0);
        assert_eq!(t.entries, 3);
    }

    #[test]
    fn insertion_order_is_kept_and_sorts_are_explicit() {
        let p = vec![prod("a", "Rye", 1.0, Shift::Morning), prod("b", "Bagel", 1.0, Shift::Night)];
        let d = vec![disp("d1", "Bagel", 9.0, "Stale", "2024-02-01"), disp("d2", "Rye", 9.0, "Stale", "2024-02-01"), disp("d3", "Cake", 12.0, "Stale", "2024-02-01")];
        let all = entries(&p, &d);
        let agg = aggregate(&all, |e| e.product_name().to_string());

        let seen: Vec<&String> = agg.iter().map(|(k, _)| k).collect();
        assert_eq!(seen, vec!["Rye", "Bagel", "Cake"]);

        let by_key: Vec<String> = agg.sorted_by_key().into_iter().map(|(k, _)| k).collect();
        assert_eq!(by_key, vec!["Bagel", "Cake", "Rye"]);

        let by_waste: Vec<String> = agg.sorted_by_disposal_desc().into_iter().map(|(k, _)| k).collect();
        assert_eq!(by_waste, vec!["Cake", "Bagel", "Rye"]);
    }

    #[test]
    fn reason_grouping_splits_and_skips_production() {
        let p = vec![prod("a", "Bread", 50.0, Shift::Morning)];
        let d = vec![disp("d1", "Bread", 3.0, "Expired, Damaged", "2024-02-01"), disp("d2", "Bread", 2.0, "Expired", "2024-02-01")];
        let all = entries(&p, &d);
        let agg = aggregate_by(&all, GroupBy::Reason, &[], &ReferenceZone::default());
        assert_eq!(agg.len(), 2);
        assert_eq!(agg.get(&"Expired".to_string()).unwrap().disposal, 5.0);
        assert_eq!(agg.get(&"Damaged".to_string()).unwrap().disposal, 3.0);
    }

    #[test]
    fn repeated_reasons_count_once_ignoring_case() {
        let d = vec![
            disp("d1", "Bread", 5.0, "Expired, expired, Expired", "2024-02-01"),
            disp("d2", "Bread", 2.0, "EXPIRED", "2024-02-01"),
        ];
        let all = entries(&[], &d);
        let agg = aggregate_by(&all, GroupBy::Reason, &[], &ReferenceZone::default());
        assert_eq!(agg.len(), 1);
        let t = agg.get(&"Expired".to_string()).unwrap();
        assert_eq!(t.disposal, 7.0);
        assert_eq!(t.entries, 2);
    }

    #[test]
    fn category_lookup_trims_entry_names() {
        let products = vec![Product {
            id: "bread".into(),
            name: "Bread".into(),
            category: "Loaves".into(),
            unit: "pcs".into(),
            description: None,
        }];
        let mut p = prod("a", " Bread ", 6.0, Shift::Morning);
        p.product_id = "legacy-id".into();
        let p = vec![p];
        let all = entries(&p, &[]);
        let agg = aggregate_by(&all, GroupBy::Category, &products, &ReferenceZone::default());
        assert_eq!(agg.get(&"Loaves".to_string()).unwrap().production, 6.0);
    }

    #[test]
    fn category_misses_fall_back_to_unknown() {
        let products = vec![Product {
            id: "bread".into(),
            name: "Bread".into(),
            category: "Loaves".into(),
            unit: "pcs".into(),
            description: None,
        }];
        let p = vec![prod("a", "Bread", 10.0, Shift::Morning), prod("b", "Mystery", 4.0, Shift::Morning)];
        let all = entries(&p, &[]);
        let agg = aggregate_by(&all, GroupBy::Category, &products, &ReferenceZone::default());
        assert_eq!(agg.get(&"Loaves".to_string()).unwrap().production, 10.0);
        assert_eq!(agg.get(&UNKNOWN_CATEGORY.to_string()).unwrap().production, 4.0);
    }

    #[test]
    fn date_grouping_skips_unreadable_dates() {
        let d = vec![disp("d1", "Bread", 3.0, "Stale", "2024-02-01T10:00:00"), disp("d2", "Bread", 1.0, "Stale", "??")];
        let all = entries(&[], &d);
        let agg = aggregate_by(&all, GroupBy::Date, &[], &ReferenceZone::default());
        assert_eq!(agg.len(), 1);
        assert_eq!(agg.grand_total().disposal, 3.0);
    }

    #[test]
    fn shift_grouping_uses_normalized_names() {
        let p = vec![prod("a", "Bread", 1.0, Shift::Morning), prod("b", "Bread", 2.0, Shift::Unknown)];
        let all = entries(&p, &[]);
        let agg = aggregate_by(&all, GroupBy::Shift, &[], &ReferenceZone::default());
        assert_eq!(agg.sorted_by_key().into_iter().map(|(k, _)| k).collect::<Vec<_>>(), vec!["morning", "unknown"]);
    }
}
