use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

/// A page of results plus the count of everything the filter matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub total: u64,
    pub limit: u64,
    pub skip: u64,
    pub data: Vec<T>,
}

/// Result of `find`: a page when pagination applies, the bare documents otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum FindResult {
    Page(Paginated<Document>),
    All(Vec<Document>),
}

impl FindResult {
    /// The documents regardless of pagination.
    #[must_use]
    pub fn data(&self) -> &[Document] {
        match self {
            Self::Page(p) => &p.data,
            Self::All(d) => d,
        }
    }

    #[must_use]
    pub fn into_data(self) -> Vec<Document> {
        match self {
            Self::Page(p) => p.data,
            Self::All(d) => d,
        }
    }

    #[must_use]
    pub const fn as_page(&self) -> Option<&Paginated<Document>> {
        match self {
            Self::Page(p) => Some(p),
            Self::All(_) => None,
        }
    }
}

/// Singular or plural payloads and results.
///
/// A specific id (or a single record to create) yields `One`; a null id or a
/// batch yields `Many`.
#[derive(Debug, Clone, PartialEq)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    #[must_use]
    pub const fn is_many(&self) -> bool {
        matches!(self, Self::Many(_))
    }

    /// Number of records carried; `One` counts as one.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(t) => vec![t],
            Self::Many(v) => v,
        }
    }

    /// Returns the single value, or `None` for the plural form.
    #[must_use]
    pub fn into_one(self) -> Option<T> {
        match self {
            Self::One(t) => Some(t),
            Self::Many(_) => None,
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> OneOrMany<U> {
        match self {
            Self::One(t) => OneOrMany::One(f(t)),
            Self::Many(v) => OneOrMany::Many(v.into_iter().map(f).collect()),
        }
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(v: Vec<T>) -> Self {
        Self::Many(v)
    }
}

impl From<Document> for OneOrMany<Document> {
    fn from(d: Document) -> Self {
        Self::One(d)
    }
}

/// Renders an identifier for messages: strings unquoted, object ids as hex.
#[must_use]
pub fn display_id(id: &Bson) -> String {
    match id {
        Bson::String(s) => s.clone(),
        Bson::ObjectId(oid) => oid.to_hex(),
        other => other.to_string(),
    }
}

/// Converts a document to relaxed extended JSON.
#[must_use]
pub fn to_json(doc: &Document) -> serde_json::Value {
    Bson::Document(doc.clone()).into_relaxed_extjson()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn display_id_forms() {
        let oid = bson::oid::ObjectId::new();
        assert_eq!(display_id(&Bson::ObjectId(oid)), oid.to_hex());
        assert_eq!(display_id(&Bson::String("k1".into())), "k1");
        assert_eq!(display_id(&Bson::Int32(7)), "7");
    }

    #[test]
    fn one_or_many_helpers() {
        let one: OneOrMany<Document> = doc! {"a": 1}.into();
        assert!(!one.is_many());
        assert_eq!(one.clone().into_vec().len(), 1);
        let many: OneOrMany<i32> = vec![1, 2, 3].into();
        assert!(many.is_many());
        assert_eq!(many.map(|x| x * 2).into_vec(), vec![2, 4, 6]);
    }
}
