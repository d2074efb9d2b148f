use bson::{Bson, Document};

use super::types::{CompiledQuery, LIMIT, QueryOptions, SELECT, SKIP, SORT, Select};
use crate::errors::ServiceError;
use crate::id::IdPolicy;

/// Splits `query` into native filter and options, and constrains it to `id` if given.
///
/// A target id is appended to `$and` rather than written onto the id field,
/// so it can coexist with a direct id filter in the query: both are coerced
/// and a mismatch simply matches nothing.
///
/// # Errors
/// `BadRequest` for malformed pseudo-fields.
pub fn compile_query(
    policy: &IdPolicy,
    id: Option<&Bson>,
    query: &Document,
) -> Result<CompiledQuery, ServiceError> {
    let mut filter = Document::new();
    let mut options = QueryOptions::default();

    for (key, value) in query {
        match key.as_str() {
            SELECT => options.select = Some(Select::from_bson(value)?),
            SORT => options.sort = Some(sort_spec(value)?),
            LIMIT => options.limit = Some(non_negative(LIMIT, value)?),
            SKIP => options.skip = Some(non_negative(SKIP, value)?),
            _ => {
                filter.insert(key.clone(), value.clone());
            }
        }
    }

    if let Some(id) = id {
        let mut eq = Document::new();
        eq.insert(policy.field(), policy.coerce(id));
        let constraint = Bson::Document(eq);
        match filter.get_mut("$and") {
            Some(Bson::Array(clauses)) => clauses.push(constraint),
            Some(_) => return Err(ServiceError::BadRequest("$and must be an array".into())),
            None => {
                filter.insert("$and", vec![constraint]);
            }
        }
    }

    if let Some(direct) = filter.get(policy.field()) {
        let coerced = policy.coerce_filter_value(direct);
        filter.insert(policy.field(), coerced);
    }

    Ok(CompiledQuery { options, filter })
}

fn sort_spec(value: &Bson) -> Result<Document, ServiceError> {
    match value {
        Bson::Document(d) => Ok(d.clone()),
        other => Err(ServiceError::BadRequest(format!("$sort must be a map, got {other}"))),
    }
}

/// Accepts any integral BSON number (or a numeric string from a query string) that is >= 0.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn non_negative(name: &str, value: &Bson) -> Result<u64, ServiceError> {
    let parsed = match value {
        Bson::Int32(i) => u64::try_from(*i).ok(),
        Bson::Int64(i) => u64::try_from(*i).ok(),
        Bson::Double(f) if f.fract() == 0.0 && *f >= 0.0 => Some(*f as u64),
        Bson::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        ServiceError::BadRequest(format!("{name} must be a non-negative integer, got {value}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use bson::oid::ObjectId;

    #[test]
    fn strips_pseudo_fields() {
        let q = doc! {
            "name": "x",
            "$select": ["name"],
            "$sort": {"name": -1},
            "$limit": 5,
            "$skip": "2",
            "$or": [{"a": 1}],
        };
        let c = compile_query(&IdPolicy::default(), None, &q).unwrap();
        assert_eq!(c.filter, doc! {"name": "x", "$or": [{"a": 1}]});
        assert_eq!(c.options.select, Some(Select::Fields(vec!["name".into()])));
        assert_eq!(c.options.sort, Some(doc! {"name": -1}));
        assert_eq!(c.options.limit, Some(5));
        assert_eq!(c.options.skip, Some(2));
    }

    #[test]
    fn target_id_augments_and() {
        let oid = ObjectId::new();
        let q = doc! {"$and": [{"a": 1}]};
        let c = compile_query(&IdPolicy::default(), Some(&Bson::String(oid.to_hex())), &q)
            .unwrap();
        assert_eq!(c.filter, doc! {"$and": [{"a": 1}, {"_id": oid}]});
    }

    #[test]
    fn direct_id_filter_is_coerced_alongside_target() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let q = doc! {"_id": a.to_hex()};
        let c = compile_query(&IdPolicy::default(), Some(&Bson::ObjectId(b)), &q).unwrap();
        assert_eq!(c.filter, doc! {"_id": a, "$and": [{"_id": b}]});
    }

    #[test]
    fn custom_id_field_is_not_coerced() {
        let hex = ObjectId::new().to_hex();
        let policy = IdPolicy::new("key", false);
        let c = compile_query(&policy, Some(&Bson::String(hex.clone())), &doc! {}).unwrap();
        assert_eq!(c.filter, doc! {"$and": [{"key": hex}]});
    }

    #[test]
    fn rejects_malformed_pseudo_fields() {
        let p = IdPolicy::default();
        assert!(compile_query(&p, None, &doc! {"$limit": -1}).is_err());
        assert!(compile_query(&p, None, &doc! {"$skip": 1.5}).is_err());
        assert!(compile_query(&p, None, &doc! {"$sort": "name"}).is_err());
        assert!(compile_query(&p, None, &doc! {"$select": "name"}).is_err());
        assert!(compile_query(&p, None, &doc! {"$select": [1]}).is_err());
        assert!(compile_query(&p, Some(&Bson::Int32(1)), &doc! {"$and": 1}).is_err());
    }
}
