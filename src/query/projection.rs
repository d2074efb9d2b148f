use bson::{Bson, Document};

use super::types::Select;

/// Turns a `$select` value into a native projection.
///
/// A field list becomes an inclusion map; a map is forwarded unchanged.
/// The id field is not added here, see [`with_id_field`].
#[must_use]
pub fn build_projection(select: &Select) -> Document {
    match select {
        Select::Fields(fields) => {
            let mut projection = Document::new();
            for name in fields {
                projection.insert(name.clone(), 1);
            }
            projection
        }
        Select::Map(map) => map.clone(),
    }
}

/// Forces the id field into an inclusion projection.
///
/// Exclusion projections already return the id unless the caller excluded it
/// explicitly, so they are left alone.
#[must_use]
pub fn with_id_field(mut projection: Document, id_field: &str) -> Document {
    let excluding = projection.iter().any(|(k, v)| k != id_field && is_exclusion(v));
    if !excluding {
        projection.insert(id_field, 1);
    }
    projection
}

/// Projection for an optional `$select`, id included.
#[must_use]
pub fn projection_for(select: Option<&Select>, id_field: &str) -> Option<Document> {
    select.map(|s| with_id_field(build_projection(s), id_field))
}

fn is_exclusion(v: &Bson) -> bool {
    matches!(v, Bson::Int32(0) | Bson::Int64(0) | Bson::Boolean(false))
        || matches!(v, Bson::Double(f) if *f == 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn list_becomes_inclusion_map() {
        let p = build_projection(&Select::Fields(vec!["a".into(), "b".into()]));
        assert_eq!(p, doc! {"a": 1, "b": 1});
    }

    #[test]
    fn map_is_forwarded() {
        let p = build_projection(&Select::Map(doc! {"a": 0}));
        assert_eq!(p, doc! {"a": 0});
    }

    #[test]
    fn id_forced_into_inclusion_only() {
        assert_eq!(with_id_field(doc! {"a": 1}, "_id"), doc! {"a": 1, "_id": 1});
        assert_eq!(with_id_field(doc! {"a": 0}, "_id"), doc! {"a": 0});
        assert_eq!(with_id_field(doc! {"a": 1, "key": 0}, "key"), doc! {"a": 1, "key": 1});
        assert_eq!(projection_for(None, "_id"), None);
    }
}
