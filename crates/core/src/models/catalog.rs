//! Catalog models
//!
//! Two shapes live here: the flat records exchanged with the remote
//! catalog service, and the nested tree held in a [`CatalogSnapshot`].
//!
//! [`CatalogSnapshot`]: crate::snapshot::CatalogSnapshot

use serde::{Deserialize, Serialize};

/// Identifier shared by all catalog entities
pub type EntityId = i64;

/// Catalog entity types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Category,
    Brand,
    Perfume,
}

impl EntityKind {
    /// Plural collection name, as used in remote paths
    pub fn collection(self) -> &'static str {
        match self {
            EntityKind::Category => "categories",
            EntityKind::Brand => "brands",
            EntityKind::Perfume => "perfumes",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Category => "Category",
            EntityKind::Brand => "Brand",
            EntityKind::Perfume => "Perfume",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Flat records (remote wire shape)
// ---------------------------------------------------------------------------

/// Category as returned by the catalog service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRecord {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Brand as returned by the catalog service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandRecord {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category_id: EntityId,
    #[serde(default, rename = "imageUrl", alias = "imageRef")]
    pub image_ref: Option<String>,
}

/// Perfume as returned by the catalog service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfumeRecord {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub number: Option<i32>,
    pub brand_id: EntityId,
}

// ---------------------------------------------------------------------------
// Snapshot tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub brands: Vec<Brand>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Brand {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category_id: EntityId,
    #[serde(default, rename = "imageUrl", alias = "imageRef")]
    pub image_ref: Option<String>,
    #[serde(default)]
    pub perfumes: Vec<Perfume>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Perfume {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub number: Option<i32>,
    pub brand_id: EntityId,
}

impl Category {
    pub fn from_record(record: CategoryRecord, brands: Vec<Brand>) -> Self {
        Self {
            id: record.id,
            name: record.name,
            description: record.description,
            color: record.color,
            brands,
        }
    }
}

impl Brand {
    pub fn from_record(record: BrandRecord, perfumes: Vec<Perfume>) -> Self {
        Self {
            id: record.id,
            name: record.name,
            description: record.description,
            category_id: record.category_id,
            image_ref: record.image_ref,
            perfumes,
        }
    }
}

impl From<PerfumeRecord> for Perfume {
    fn from(record: PerfumeRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            number: record.number,
            brand_id: record.brand_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Derived views
// ---------------------------------------------------------------------------

/// Perfume annotated with its brand and category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfumeView {
    pub id: EntityId,
    pub name: String,
    pub number: Option<i32>,
    pub brand_id: EntityId,
    pub brand_name: String,
    pub category_id: EntityId,
    pub category_name: String,
}

/// Brand annotated with its category name (perfumes omitted)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandView {
    pub id: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub image_ref: Option<String>,
    pub category_id: EntityId,
    pub category_name: String,
    pub perfume_count: usize,
}

// ---------------------------------------------------------------------------
// Write requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDraft {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandDraft {
    pub name: String,
    pub description: Option<String>,
    pub category_id: EntityId,
    #[serde(rename = "imageUrl")]
    pub image_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfumeDraft {
    pub name: String,
    pub number: Option<i32>,
    pub brand_id: EntityId,
}

/// Payload for a create or update of any catalog entity
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogDraft {
    Category(CategoryDraft),
    Brand(BrandDraft),
    Perfume(PerfumeDraft),
}

impl CatalogDraft {
    pub fn kind(&self) -> EntityKind {
        match self {
            CatalogDraft::Category(_) => EntityKind::Category,
            CatalogDraft::Brand(_) => EntityKind::Brand,
            CatalogDraft::Perfume(_) => EntityKind::Perfume,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CatalogDraft::Category(d) => &d.name,
            CatalogDraft::Brand(d) => &d.name,
            CatalogDraft::Perfume(d) => &d.name,
        }
    }

    /// JSON body sent to the catalog service
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            CatalogDraft::Category(d) => serde_json::to_value(d),
            CatalogDraft::Brand(d) => serde_json::to_value(d),
            CatalogDraft::Perfume(d) => serde_json::to_value(d),
        }
    }
}

/// An admin write against the catalog
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Create(CatalogDraft),
    Update { id: EntityId, draft: CatalogDraft },
    Delete { kind: EntityKind, id: EntityId },
}

impl Mutation {
    pub fn kind(&self) -> EntityKind {
        match self {
            Mutation::Create(draft) => draft.kind(),
            Mutation::Update { draft, .. } => draft.kind(),
            Mutation::Delete { kind, .. } => *kind,
        }
    }

    /// Past-tense verb for user-facing messages
    pub fn verb(&self) -> &'static str {
        match self {
            Mutation::Create(_) => "created",
            Mutation::Update { .. } => "updated",
            Mutation::Delete { .. } => "deleted",
        }
    }
}
