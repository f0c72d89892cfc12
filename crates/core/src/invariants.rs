//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use std::collections::HashSet;

use crate::snapshot::CatalogSnapshot;

/// Validate that a snapshot's tree is internally consistent
pub fn assert_snapshot_invariants(snapshot: &CatalogSnapshot) {
    if !cfg!(debug_assertions) {
        return;
    }

    let mut category_ids = HashSet::new();
    let mut brand_ids = HashSet::new();
    let mut perfume_ids = HashSet::new();

    for category in &snapshot.categories {
        debug_assert!(
            category_ids.insert(category.id),
            "Category id {} appears twice in snapshot",
            category.id
        );

        for brand in &category.brands {
            debug_assert!(
                brand.category_id == category.id,
                "Brand {} filed under category {} but references {}",
                brand.id,
                category.id,
                brand.category_id
            );
            debug_assert!(
                brand_ids.insert(brand.id),
                "Brand id {} appears twice in snapshot",
                brand.id
            );

            for perfume in &brand.perfumes {
                debug_assert!(
                    perfume.brand_id == brand.id,
                    "Perfume {} filed under brand {} but references {}",
                    perfume.id,
                    brand.id,
                    perfume.brand_id
                );
                debug_assert!(
                    perfume_ids.insert(perfume.id),
                    "Perfume id {} appears twice in snapshot",
                    perfume.id
                );
            }
        }
    }
}
