//! Catalog snapshot
//!
//! The full categories -> brands -> perfumes tree, assembled from the
//! three flat lists the catalog service returns. Every read view is
//! derived from the tree on demand.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::invariants::assert_snapshot_invariants;
use crate::models::{
    Brand, BrandRecord, BrandView, Category, CategoryRecord, EntityId, Perfume, PerfumeRecord,
    PerfumeView,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub categories: Vec<Category>,
}

/// Entity counts for the admin dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub categories: usize,
    pub brands: usize,
    pub perfumes: usize,
}

/// Public search and filter criteria
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerfumeFilter {
    /// Matched case-insensitively against name and brand, and as a
    /// substring of the perfume number
    pub query: String,
    /// Exact brand name
    pub brand: Option<String>,
    pub category_id: Option<EntityId>,
    pub min_number: Option<i32>,
    pub max_number: Option<i32>,
}

impl PerfumeFilter {
    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.query.trim().is_empty()
            && self.brand.is_none()
            && self.category_id.is_none()
            && self.min_number.is_none()
            && self.max_number.is_none()
    }

    fn matches(&self, perfume: &PerfumeView) -> bool {
        let query = self.query.trim();
        if !query.is_empty() {
            let lower = query.to_lowercase();
            let by_text = perfume.name.to_lowercase().contains(&lower)
                || perfume.brand_name.to_lowercase().contains(&lower);
            let by_number = perfume
                .number
                .map(|n| n.to_string().contains(query))
                .unwrap_or(false);
            if !by_text && !by_number {
                return false;
            }
        }

        if let Some(brand) = &self.brand {
            if &perfume.brand_name != brand {
                return false;
            }
        }

        if let Some(category_id) = self.category_id {
            if perfume.category_id != category_id {
                return false;
            }
        }

        if self.min_number.is_some() || self.max_number.is_some() {
            let Some(number) = perfume.number else {
                return false;
            };
            if self.min_number.is_some_and(|min| number < min) {
                return false;
            }
            if self.max_number.is_some_and(|max| number > max) {
                return false;
            }
        }

        true
    }
}

impl CatalogSnapshot {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    /// Join three flat lists into the tree.
    ///
    /// Brands pointing at an unknown category, and perfumes pointing at
    /// a brand that did not make it into the tree, are dropped. So is
    /// any entry whose id was already seen at its level; the first one
    /// wins. Input order is preserved at every level.
    pub fn assemble(
        categories: Vec<CategoryRecord>,
        brands: Vec<BrandRecord>,
        perfumes: Vec<PerfumeRecord>,
    ) -> Self {
        let mut duplicates = 0usize;

        let mut seen = HashSet::new();
        let mut perfumes_by_brand: HashMap<EntityId, Vec<Perfume>> = HashMap::new();
        for perfume in perfumes {
            if !seen.insert(perfume.id) {
                duplicates += 1;
                continue;
            }
            perfumes_by_brand
                .entry(perfume.brand_id)
                .or_default()
                .push(perfume.into());
        }

        let mut seen = HashSet::new();
        let mut brands_by_category: HashMap<EntityId, Vec<Brand>> = HashMap::new();
        for brand in brands {
            if !seen.insert(brand.id) {
                duplicates += 1;
                continue;
            }
            let owned = perfumes_by_brand.remove(&brand.id).unwrap_or_default();
            brands_by_category
                .entry(brand.category_id)
                .or_default()
                .push(Brand::from_record(brand, owned));
        }

        let mut seen = HashSet::new();
        let categories: Vec<Category> = categories
            .into_iter()
            .filter(|record| {
                let first = seen.insert(record.id);
                if !first {
                    duplicates += 1;
                }
                first
            })
            .map(|record| {
                let owned = brands_by_category.remove(&record.id).unwrap_or_default();
                Category::from_record(record, owned)
            })
            .collect();

        let orphan_brands: usize = brands_by_category.values().map(Vec::len).sum();
        let orphan_perfumes: usize = perfumes_by_brand.values().map(Vec::len).sum();
        if orphan_brands > 0 || orphan_perfumes > 0 || duplicates > 0 {
            tracing::debug!(
                orphan_brands,
                orphan_perfumes,
                duplicates,
                "Dropped catalog entries that do not fit the tree"
            );
        }

        let snapshot = Self { categories };
        assert_snapshot_invariants(&snapshot);
        snapshot
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn category_by_id(&self, id: EntityId) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn brand_by_id(&self, id: EntityId) -> Option<&Brand> {
        self.categories
            .iter()
            .flat_map(|c| c.brands.iter())
            .find(|b| b.id == id)
    }

    pub fn category_by_name(&self, name: &str) -> Option<&Category> {
        self.categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Find a brand by name, optionally restricted to one category
    pub fn brand_by_name(&self, name: &str, category_id: Option<EntityId>) -> Option<&Brand> {
        self.categories
            .iter()
            .filter(|c| category_id.map_or(true, |id| c.id == id))
            .flat_map(|c| c.brands.iter())
            .find(|b| b.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Every perfume, annotated with its brand and category
    pub fn all_perfumes(&self) -> Vec<PerfumeView> {
        self.categories
            .iter()
            .flat_map(|category| {
                category.brands.iter().flat_map(move |brand| {
                    brand.perfumes.iter().map(move |perfume| PerfumeView {
                        id: perfume.id,
                        name: perfume.name.clone(),
                        number: perfume.number,
                        brand_id: brand.id,
                        brand_name: brand.name.clone(),
                        category_id: category.id,
                        category_name: category.name.clone(),
                    })
                })
            })
            .collect()
    }

    /// Every brand, annotated with its category
    pub fn all_brands(&self) -> Vec<BrandView> {
        self.categories
            .iter()
            .flat_map(|category| {
                category.brands.iter().map(move |brand| BrandView {
                    id: brand.id,
                    name: brand.name.clone(),
                    description: brand.description.clone(),
                    image_ref: brand.image_ref.clone(),
                    category_id: category.id,
                    category_name: category.name.clone(),
                    perfume_count: brand.perfumes.len(),
                })
            })
            .collect()
    }

    pub fn search(&self, filter: &PerfumeFilter) -> Vec<PerfumeView> {
        self.all_perfumes()
            .into_iter()
            .filter(|p| filter.matches(p))
            .collect()
    }

    pub fn stats(&self) -> CatalogStats {
        let brands = self.categories.iter().map(|c| c.brands.len()).sum();
        let perfumes = self
            .categories
            .iter()
            .flat_map(|c| c.brands.iter())
            .map(|b| b.perfumes.len())
            .sum();
        CatalogStats {
            categories: self.categories.len(),
            brands,
            perfumes,
        }
    }
}
