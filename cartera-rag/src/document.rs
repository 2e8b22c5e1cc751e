//! Data types for customer records, indexed documents, and query results.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Value stored in [`CustomerMetadata::sex`] when the profile has none.
pub const UNKNOWN_SEX: &str = "UNKNOWN";

/// A customer summary record as read from the record store.
///
/// Records are immutable once loaded. The wire keys follow the record file
/// (`cliente_id`, `resumen`, `perfil`); English aliases are accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerRecord {
    /// Unique customer identifier.
    #[serde(rename = "cliente_id", alias = "id")]
    pub id: String,
    /// Free-text summary of the customer; this is what gets embedded.
    #[serde(rename = "resumen", alias = "summary")]
    pub summary: String,
    /// Profile attributes used as filterable metadata.
    #[serde(rename = "perfil", alias = "profile", default)]
    pub profile: CustomerProfile,
}

/// Profile attributes of a [`CustomerRecord`]. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CustomerProfile {
    #[serde(rename = "sexo", alias = "sex", default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    #[serde(rename = "edad", alias = "age", default, skip_serializing_if = "Option::is_none")]
    pub age: Option<f64>,
    #[serde(rename = "ingreso", alias = "income", default, skip_serializing_if = "Option::is_none")]
    pub income: Option<f64>,
    #[serde(
        rename = "sector_publico_flag",
        alias = "public_sector_flag",
        default,
        deserialize_with = "deserialize_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub public_sector_flag: Option<u8>,
    /// Profile keys this crate does not interpret.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Accept `0`/`1` as well as `false`/`true` for flag fields.
fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(u8),
    }

    Ok(Option::<Flag>::deserialize(deserializer)?.map(|flag| match flag {
        Flag::Bool(b) => u8::from(b),
        Flag::Int(i) => i,
    }))
}

/// Filterable metadata stored alongside each indexed customer.
///
/// Missing profile values are replaced with explicit defaults:
/// sex becomes [`UNKNOWN_SEX`] and numeric fields become zero.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerMetadata {
    pub customer_id: String,
    pub sex: String,
    pub age: f64,
    pub income: f64,
    pub public_sector: u8,
}

impl From<&CustomerRecord> for CustomerMetadata {
    fn from(record: &CustomerRecord) -> Self {
        let profile = &record.profile;
        Self {
            customer_id: record.id.clone(),
            sex: profile.sex.clone().unwrap_or_else(|| UNKNOWN_SEX.to_string()),
            age: profile.age.unwrap_or(0.0),
            income: profile.income.unwrap_or(0.0),
            public_sector: profile.public_sector_flag.unwrap_or(0),
        }
    }
}

/// A customer summary with its vector embedding, as held by a vector store.
///
/// There is exactly one document per customer id within a collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedDocument {
    /// The customer id.
    pub id: String,
    /// The summary text that was embedded.
    pub summary: String,
    /// The embedding of `summary`.
    pub embedding: Vec<f32>,
    /// Metadata derived from the customer's profile.
    pub metadata: CustomerMetadata,
}

/// A retrieved customer paired with its distance to the query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Match {
    pub customer_id: String,
    pub summary: String,
    pub metadata: CustomerMetadata,
    /// Vector distance to the query (lower is more relevant, never negative).
    pub distance: f32,
}

/// The result of answering a question from retrieved context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerResult {
    /// The generated answer.
    pub answer: String,
    /// The matches the answer was grounded on, in ascending distance order.
    pub matches: Vec<Match>,
    /// Number of matches placed in the prompt; always `matches.len()`.
    pub context_used: usize,
}

/// Whether the customer collection holds any documents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndexStatus {
    Empty,
    Ready,
}

/// Health summary of the customer collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStats {
    pub collection_name: String,
    pub total_documents: usize,
    pub status: IndexStatus,
}

impl IndexStats {
    pub(crate) fn new(collection_name: &str, total_documents: usize) -> Self {
        let status = if total_documents > 0 { IndexStatus::Ready } else { IndexStatus::Empty };
        Self { collection_name: collection_name.to_string(), total_documents, status }
    }
}
