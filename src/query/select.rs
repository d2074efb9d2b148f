use bson::Document;

use super::types::{SELECT, Select};
use crate::errors::ServiceError;
use crate::store::{get_path, insert_path};

/// Result trimmer built from a query's `$select`.
///
/// Only a field list trims; a projection map or no `$select` leaves
/// documents untouched.
#[derive(Debug, Clone, Default)]
pub struct Selector {
    fields: Option<Vec<String>>,
}

impl Selector {
    /// Reads `$select` from `query` and adds `extra` fields (usually the id field).
    ///
    /// # Errors
    /// `BadRequest` when `$select` is malformed.
    pub fn from_query(query: &Document, extra: &[&str]) -> Result<Self, ServiceError> {
        let fields = match query.get(SELECT).map(Select::from_bson).transpose()? {
            Some(Select::Fields(mut fields)) => {
                for name in extra {
                    if !fields.iter().any(|f| f == name) {
                        fields.push((*name).to_string());
                    }
                }
                Some(fields)
            }
            Some(Select::Map(_)) | None => None,
        };
        Ok(Self { fields })
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.fields.is_none()
    }

    /// Keeps the selected fields of `doc`, in selection order. Dotted names
    /// are copied as nested documents.
    #[must_use]
    pub fn apply(&self, doc: Document) -> Document {
        let Some(fields) = &self.fields else {
            return doc;
        };
        let mut out = Document::new();
        for name in fields {
            if let Some(value) = get_path(&doc, name) {
                insert_path(&mut out, name, value.clone());
            }
        }
        out
    }

    #[must_use]
    pub fn apply_all(&self, docs: Vec<Document>) -> Vec<Document> {
        docs.into_iter().map(|d| self.apply(d)).collect()
    }
}

/// Post-processor for write results: trims to `$select` plus `id_field`.
///
/// # Errors
/// `BadRequest` when `$select` is malformed.
pub fn select(query: &Document, id_field: &str) -> Result<Selector, ServiceError> {
    Selector::from_query(query, &[id_field])
}
