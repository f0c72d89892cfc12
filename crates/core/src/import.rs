//! Bulk import normalization
//!
//! Spreadsheet exports arrive as rows of `header -> value`. Each entity
//! has its own column scheme; rows are parsed into that scheme,
//! resolved against the current snapshot, and either accepted as a
//! [`CatalogDraft`] or quarantined with a reason. Nothing is defaulted
//! to paper over a bad row.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::models::{BrandDraft, CatalogDraft, CategoryDraft, EntityKind, PerfumeDraft};
use crate::snapshot::CatalogSnapshot;
use crate::validation::validate_draft;

/// One imported row, keyed by column header
pub type RawRow = BTreeMap<String, String>;

pub mod columns {
    pub const CATEGORY_NAME: &str = "Category Name";
    pub const BRAND_NAME: &str = "Brand Name";
    pub const PERFUME_NAME: &str = "Perfume Name";
    pub const PERFUME_NUMBER: &str = "Perfume Number";
    pub const CATEGORY: &str = "Category";
    pub const BRAND: &str = "Brand";
    pub const DESCRIPTION: &str = "Description";
    pub const COLOR: &str = "Color";
    pub const IMAGE_URL: &str = "Image URL";
}

/// A row parsed into its entity's column scheme
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportRow {
    Category {
        name: String,
        description: Option<String>,
        color: Option<String>,
    },
    Brand {
        name: String,
        category: String,
        description: Option<String>,
        image_url: Option<String>,
    },
    Perfume {
        name: String,
        brand: String,
        category: Option<String>,
        number: Option<i32>,
    },
}

/// A rejected row. `row` is 1-based, counting data rows only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuarantinedRow {
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub accepted: Vec<CatalogDraft>,
    pub quarantined: Vec<QuarantinedRow>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.quarantined.is_empty()
    }
}

fn cell<'a>(row: &'a RawRow, column: &str) -> Option<&'a str> {
    row.get(column)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn required(row: &RawRow, column: &str) -> std::result::Result<String, String> {
    cell(row, column)
        .map(str::to_string)
        .ok_or_else(|| format!("Missing required field \"{}\"", column))
}

fn optional(row: &RawRow, column: &str) -> Option<String> {
    cell(row, column).map(str::to_string)
}

impl ImportRow {
    /// Parse a raw row under the column scheme for `kind`
    pub fn parse(kind: EntityKind, row: &RawRow) -> std::result::Result<Self, String> {
        use columns::*;

        match kind {
            EntityKind::Category => Ok(ImportRow::Category {
                name: required(row, CATEGORY_NAME)?,
                description: optional(row, DESCRIPTION),
                color: optional(row, COLOR),
            }),
            EntityKind::Brand => Ok(ImportRow::Brand {
                name: required(row, BRAND_NAME)?,
                category: required(row, CATEGORY)?,
                description: optional(row, DESCRIPTION),
                image_url: optional(row, IMAGE_URL),
            }),
            EntityKind::Perfume => {
                let number = match cell(row, PERFUME_NUMBER) {
                    Some(raw) => Some(
                        raw.parse::<i32>()
                            .map_err(|_| format!("\"{}\" is not a number: {}", PERFUME_NUMBER, raw))?,
                    ),
                    None => None,
                };
                Ok(ImportRow::Perfume {
                    name: required(row, PERFUME_NAME)?,
                    brand: required(row, BRAND)?,
                    category: optional(row, CATEGORY),
                    number,
                })
            }
        }
    }

    /// Resolve names against the snapshot and build the write request
    pub fn resolve(self, snapshot: &CatalogSnapshot) -> std::result::Result<CatalogDraft, String> {
        let draft = match self {
            ImportRow::Category {
                name,
                description,
                color,
            } => CatalogDraft::Category(CategoryDraft {
                name,
                description,
                color,
            }),
            ImportRow::Brand {
                name,
                category,
                description,
                image_url,
            } => {
                let category_id = snapshot
                    .category_by_name(&category)
                    .map(|c| c.id)
                    .ok_or_else(|| format!("Unknown category \"{}\"", category))?;
                CatalogDraft::Brand(BrandDraft {
                    name,
                    description,
                    category_id,
                    image_ref: image_url,
                })
            }
            ImportRow::Perfume {
                name,
                brand,
                category,
                number,
            } => {
                let category_id = match &category {
                    Some(category) => Some(
                        snapshot
                            .category_by_name(category)
                            .map(|c| c.id)
                            .ok_or_else(|| format!("Unknown category \"{}\"", category))?,
                    ),
                    None => None,
                };
                let brand_id = snapshot
                    .brand_by_name(&brand, category_id)
                    .map(|b| b.id)
                    .ok_or_else(|| format!("Unknown brand \"{}\"", brand))?;
                CatalogDraft::Perfume(PerfumeDraft {
                    name,
                    number,
                    brand_id,
                })
            }
        };

        validate_draft(&draft).map_err(|e| match e {
            Error::Validation(msg) => msg,
            other => other.to_string(),
        })?;
        Ok(draft)
    }
}

/// Normalize imported rows for one entity kind.
///
/// Rows with no non-empty cell are skipped silently, matching what a
/// spreadsheet's trailing blank lines look like.
pub fn normalize(kind: EntityKind, rows: &[RawRow], snapshot: &CatalogSnapshot) -> ImportReport {
    let mut report = ImportReport::default();

    for (index, row) in rows.iter().enumerate() {
        if row.values().all(|v| v.trim().is_empty()) {
            continue;
        }

        match ImportRow::parse(kind, row).and_then(|parsed| parsed.resolve(snapshot)) {
            Ok(draft) => report.accepted.push(draft),
            Err(reason) => report.quarantined.push(QuarantinedRow {
                row: index + 1,
                reason,
            }),
        }
    }

    tracing::debug!(
        kind = %kind,
        accepted = report.accepted.len(),
        quarantined = report.quarantined.len(),
        "Normalized import rows"
    );
    report
}

/// Parse a JSON array of flat objects into rows.
///
/// Scalar values are stringified; nested values are rejected.
pub fn rows_from_json(json: &str) -> Result<Vec<RawRow>> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let items = value
        .as_array()
        .ok_or_else(|| Error::validation("Import file must contain a JSON array"))?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let object = item.as_object().ok_or_else(|| {
                Error::validation(format!("Row {}: expected an object", index + 1))
            })?;
            object
                .iter()
                .map(|(key, value)| {
                    let text = match value {
                        serde_json::Value::Null => String::new(),
                        serde_json::Value::String(s) => s.clone(),
                        serde_json::Value::Number(n) => n.to_string(),
                        serde_json::Value::Bool(b) => b.to_string(),
                        _ => {
                            return Err(Error::validation(format!(
                                "Row {}: field \"{}\" must be a plain value",
                                index + 1,
                                key
                            )))
                        }
                    };
                    Ok((key.clone(), text))
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BrandRecord, CategoryRecord};

    fn row(cells: &[(&str, &str)]) -> RawRow {
        cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn snapshot() -> CatalogSnapshot {
        CatalogSnapshot::assemble(
            vec![
                CategoryRecord {
                    id: 1,
                    name: "Men".to_string(),
                    description: None,
                    color: None,
                },
                CategoryRecord {
                    id: 2,
                    name: "Women".to_string(),
                    description: None,
                    color: None,
                },
            ],
            vec![BrandRecord {
                id: 10,
                name: "Dior".to_string(),
                description: None,
                category_id: 1,
                image_ref: None,
            }],
            Vec::new(),
        )
    }

    #[test]
    fn test_category_rows() {
        let rows = vec![
            row(&[("Category Name", "Unisex"), ("Color", "green")]),
            row(&[("Category Name", " "), ("Description", "no name")]),
            row(&[("Category Name", ""), ("Description", "")]),
        ];
        let report = normalize(EntityKind::Category, &rows, &snapshot());

        assert_eq!(report.accepted.len(), 1);
        assert_eq!(
            report.quarantined,
            vec![QuarantinedRow {
                row: 2,
                reason: "Missing required field \"Category Name\"".to_string()
            }]
        );
    }

    #[test]
    fn test_brand_rows_resolve_category_case_insensitively() {
        let rows = vec![
            row(&[("Brand Name", "Creed"), ("Category", "men")]),
            row(&[("Brand Name", "Ghost"), ("Category", "Kids")]),
        ];
        let report = normalize(EntityKind::Brand, &rows, &snapshot());

        match &report.accepted[..] {
            [CatalogDraft::Brand(draft)] => assert_eq!(draft.category_id, 1),
            other => panic!("unexpected accepted rows: {:?}", other),
        }
        assert_eq!(report.quarantined[0].reason, "Unknown category \"Kids\"");
    }

    #[test]
    fn test_brand_row_with_bad_image_is_quarantined() {
        let rows = vec![row(&[
            ("Brand Name", "Creed"),
            ("Category", "Men"),
            ("Image URL", "logo.txt"),
        ])];
        let report = normalize(EntityKind::Brand, &rows, &snapshot());
        assert!(report.accepted.is_empty());
        assert!(!report.is_clean());
    }

    #[test]
    fn test_perfume_rows() {
        let rows = vec![
            row(&[("Perfume Name", "Sauvage"), ("Brand", "Dior"), ("Perfume Number", "112")]),
            row(&[("Perfume Name", "Sauvage"), ("Brand", "Dior"), ("Category", "Women")]),
            row(&[("Perfume Name", "Sauvage"), ("Brand", "Dior"), ("Perfume Number", "12a")]),
        ];
        let report = normalize(EntityKind::Perfume, &rows, &snapshot());

        match &report.accepted[..] {
            [CatalogDraft::Perfume(draft)] => {
                assert_eq!(draft.brand_id, 10);
                assert_eq!(draft.number, Some(112));
            }
            other => panic!("unexpected accepted rows: {:?}", other),
        }
        let rows: Vec<_> = report.quarantined.iter().map(|q| q.row).collect();
        assert_eq!(rows, vec![2, 3]);
    }

    #[test]
    fn test_rows_from_json() {
        let rows = rows_from_json(
            r#"[{"Perfume Name":"Sauvage","Brand":"Dior","Perfume Number":112,"Category":null}]"#,
        )
        .unwrap();
        assert_eq!(rows[0]["Perfume Number"], "112");
        assert_eq!(rows[0]["Category"], "");

        assert!(rows_from_json(r#"{"not":"an array"}"#).is_err());
        assert!(rows_from_json(r#"[{"Brand":{"nested":true}}]"#).is_err());
    }
}
