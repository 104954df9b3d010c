//! Entry selection by date window, product, category, reason and free-text search.

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::calendar::{DateWindow, ReferenceZone};
use crate::types::{Entry, Product};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// Product id or (case-insensitive) product name.
    pub product: Option<String>,
    pub category: Option<String>,
    pub reason: Option<String>,
    pub search_term: Option<String>,
}

fn blank_to_none(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dates(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    pub fn with_window(self, window: DateWindow) -> Self {
        self.with_dates(Some(window.from), Some(window.to))
    }

    pub fn with_product(mut self, product: &str) -> Self {
        self.product = blank_to_none(product);
        self
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = blank_to_none(category);
        self
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = blank_to_none(reason);
        self
    }

    pub fn with_search(mut self, term: &str) -> Self {
        self.search_term = blank_to_none(term);
        self
    }

    /// Inclusive bounds. A lone `date_from` means that single day.
    fn bounds(&self) -> (Option<NaiveDate>, Option<NaiveDate>) {
        match (self.date_from, self.date_to) {
            (Some(from), None) => (Some(from), Some(from)),
            (Some(from), Some(to)) if to < from => (Some(to), Some(from)),
            other => other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterOutcome<'a> {
    pub entries: Vec<Entry<'a>>,
    /// Entries dropped because their date could not be read.
    pub invalid_dates: usize,
}

/// Select entries matching every present criterion.
///
/// Unreadable dates are warned about and excluded. A category criterion joins
/// on product name against `products`; entries without a catalog match never
/// pass it.
pub fn filter_entries<'a>(
    entries: &[Entry<'a>],
    criteria: &FilterCriteria,
    products: &[Product],
    zone: &ReferenceZone,
) -> FilterOutcome<'a> {
    let (lower, upper) = criteria.bounds();
    let product = criteria.product.as_deref().map(str::to_lowercase);
    let reason = criteria.reason.as_deref().map(str::to_lowercase);
    let search = criteria.search_term.as_deref().map(str::to_lowercase);
    let category = criteria.category.as_deref().map(str::to_lowercase);
    let categories: HashMap<String, String> = if category.is_some() {
        category_index(products)
    } else {
        HashMap::new()
    };

    let mut invalid_dates = 0usize;
    let mut kept = Vec::new();
    for entry in entries {
        let Some(day) = zone.to_calendar_date(entry.date()) else {
            tracing::warn!(entry_id = entry.id(), raw_date = entry.date(), "excluding entry with unreadable date");
            invalid_dates += 1;
            continue;
        };
        if lower.is_some_and(|l| day < l) || upper.is_some_and(|u| day > u) {
            continue;
        }
        if let Some(p) = &product {
            if entry.product_id().to_lowercase() != *p && entry.product_name().to_lowercase() != *p {
                continue;
            }
        }
        if let Some(c) = &category {
            match categories.get(&entry.product_name().trim().to_lowercase()) {
                Some(found) if found == c => {}
                _ => continue,
            }
        }
        if let Some(r) = &reason {
            if !matches_reason(entry, r) {
                continue;
            }
        }
        if let Some(term) = &search {
            if !matches_search(entry, term) {
                continue;
            }
        }
        kept.push(*entry);
    }

    FilterOutcome { entries: kept, invalid_dates }
}

/// Entries whose calendar date falls inside `window`.
pub fn within_window<'a>(entries: &[Entry<'a>], window: DateWindow, zone: &ReferenceZone) -> FilterOutcome<'a> {
    filter_entries(entries, &FilterCriteria::new().with_window(window), &[], zone)
}

/// Lower-cased product name -> lower-cased category.
fn category_index(products: &[Product]) -> HashMap<String, String> {
    products
        .iter()
        .map(|p| (p.name.trim().to_lowercase(), p.category.trim().to_lowercase()))
        .collect()
}

fn matches_reason(entry: &Entry<'_>, wanted: &str) -> bool {
    match entry {
        Entry::Disposal(d) => d.reasons().any(|r| r.to_lowercase() == wanted),
        Entry::Production(_) => false,
    }
}

fn matches_search(entry: &Entry<'_>, term: &str) -> bool {
    let hit = |s: &str| s.to_lowercase().contains(term);
    hit(entry.product_name())
        || hit(entry.staff_name())
        || entry.notes().is_some_and(hit)
        || entry.reason().is_some_and(hit)
}
