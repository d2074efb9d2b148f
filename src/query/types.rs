use bson::{Bson, Document};

use crate::errors::ServiceError;

pub const SELECT: &str = "$select";
pub const SORT: &str = "$sort";
pub const LIMIT: &str = "$limit";
pub const SKIP: &str = "$skip";

/// Keys of a query object that never reach the native filter.
pub const PSEUDO_FIELDS: [&str; 4] = [SELECT, SORT, LIMIT, SKIP];

/// A `$select` value: an ordered field list or a ready-made projection map.
#[derive(Debug, Clone, PartialEq)]
pub enum Select {
    Fields(Vec<String>),
    Map(Document),
}

impl Select {
    /// # Errors
    /// `BadRequest` unless `value` is an array of strings or a document.
    pub fn from_bson(value: &Bson) -> Result<Self, ServiceError> {
        match value {
            Bson::Array(items) => items
                .iter()
                .map(|i| match i {
                    Bson::String(s) => Ok(s.clone()),
                    other => Err(ServiceError::BadRequest(format!(
                        "$select entries must be field names, got {other}"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Fields),
            Bson::Document(d) => Ok(Self::Map(d.clone())),
            other => Err(ServiceError::BadRequest(format!(
                "$select must be a list or a map, got {other}"
            ))),
        }
    }

    #[must_use]
    pub fn to_bson(&self) -> Bson {
        match self {
            Self::Fields(f) => Bson::Array(f.iter().cloned().map(Bson::String).collect()),
            Self::Map(d) => Bson::Document(d.clone()),
        }
    }
}

/// Pseudo-field values pulled out of a query object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    pub select: Option<Select>,
    pub sort: Option<Document>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
}

/// A query object split into its native filter and its pseudo-field options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledQuery {
    pub options: QueryOptions,
    pub filter: Document,
}
