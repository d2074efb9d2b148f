use bson::{Bson, Document};

use super::StoreError;
use super::eval::get_path;

/// Applies an update expression (`$set`, `$unset`, `$inc`, `$push`) in place.
///
/// Returns whether the document changed.
///
/// # Errors
/// `InvalidUpdate` for plain (non-operator) keys, unknown operators,
/// non-numeric increments, pushes onto non-arrays, or changes to `_id`.
pub fn apply_update(doc: &mut Document, update: &Document) -> Result<bool, StoreError> {
    if update.is_empty() {
        return Err(StoreError::InvalidUpdate("update document must not be empty".into()));
    }
    let mut changed = false;
    for (op, fields) in update {
        let Bson::Document(fields) = fields else {
            return Err(StoreError::InvalidUpdate(format!("{op} expects an object")));
        };
        for (path, value) in fields {
            guard_id(doc, op, path, value)?;
            changed |= match op.as_str() {
                "$set" => set_path(doc, path, value.clone())?,
                "$unset" => unset_path(doc, path),
                "$inc" => inc_path(doc, path, value)?,
                "$push" => push_path(doc, path, value.clone())?,
                other if other.starts_with('$') => {
                    return Err(StoreError::InvalidUpdate(format!("unknown modifier: {other}")));
                }
                other => {
                    return Err(StoreError::InvalidUpdate(format!(
                        "update requires atomic operators, found field {other}"
                    )));
                }
            };
        }
    }
    Ok(changed)
}

fn guard_id(doc: &Document, op: &str, path: &str, value: &Bson) -> Result<(), StoreError> {
    if path != "_id" && !path.starts_with("_id.") {
        return Ok(());
    }
    let unchanged = op == "$set" && doc.get("_id") == Some(value);
    if unchanged {
        Ok(())
    } else {
        Err(StoreError::InvalidUpdate(format!(
            "performing {op} on the path '_id' would modify the immutable field '_id'"
        )))
    }
}

fn ensure_subdoc<'a>(root: &'a mut Document, key: &str) -> Result<&'a mut Document, StoreError> {
    if root.get(key).is_none() {
        root.insert(key, Document::new());
    }
    match root.get_mut(key) {
        Some(Bson::Document(d)) => Ok(d),
        _ => Err(StoreError::InvalidUpdate(format!("cannot create field in non-object '{key}'"))),
    }
}

fn traverse_to_parent<'a>(
    root: &'a mut Document,
    path: &str,
) -> Result<(&'a mut Document, String), StoreError> {
    let mut cur = root;
    let mut iter = path.split('.').peekable();
    while let Some(seg) = iter.next() {
        if iter.peek().is_none() {
            return Ok((cur, seg.to_string()));
        }
        cur = ensure_subdoc(cur, seg)?;
    }
    Err(StoreError::InvalidUpdate("empty field path".into()))
}

fn set_path(root: &mut Document, path: &str, value: Bson) -> Result<bool, StoreError> {
    let (parent, last) = traverse_to_parent(root, path)?;
    let old = parent.insert(last, value.clone());
    Ok(old.as_ref() != Some(&value))
}

fn unset_path(root: &mut Document, path: &str) -> bool {
    match path.rsplit_once('.') {
        None => root.remove(path).is_some(),
        Some((parent, last)) => {
            let mut cur = root;
            for seg in parent.split('.') {
                match cur.get_mut(seg) {
                    Some(Bson::Document(d)) => cur = d,
                    _ => return false,
                }
            }
            cur.remove(last).is_some()
        }
    }
}

fn inc_path(root: &mut Document, path: &str, by: &Bson) -> Result<bool, StoreError> {
    let current = get_path(root, path).cloned().unwrap_or(Bson::Int32(0));
    let next = match (&current, by) {
        (Bson::Int32(a), Bson::Int32(b)) => {
            a.checked_add(*b).map_or_else(|| Bson::Int64(i64::from(*a) + i64::from(*b)), Bson::Int32)
        }
        (Bson::Int32(a), Bson::Int64(b)) => Bson::Int64(i64::from(*a).saturating_add(*b)),
        (Bson::Int64(a), Bson::Int32(b)) => Bson::Int64(a.saturating_add(i64::from(*b))),
        (Bson::Int64(a), Bson::Int64(b)) => Bson::Int64(a.saturating_add(*b)),
        (a, b) => match (as_f64(a), as_f64(b)) {
            (Some(a), Some(b)) => Bson::Double(a + b),
            _ => {
                return Err(StoreError::InvalidUpdate(format!(
                    "cannot apply $inc to non-numeric field '{path}'"
                )));
            }
        },
    };
    set_path(root, path, next)
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(v: &Bson) -> Option<f64> {
    match v {
        Bson::Double(f) => Some(*f),
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        _ => None,
    }
}

fn push_path(root: &mut Document, path: &str, value: Bson) -> Result<bool, StoreError> {
    let (parent, last) = traverse_to_parent(root, path)?;
    match parent.get_mut(&last) {
        None => {
            parent.insert(last, Bson::Array(vec![value]));
        }
        Some(Bson::Array(items)) => items.push(value),
        Some(_) => {
            return Err(StoreError::InvalidUpdate(format!("'{path}' is not an array")));
        }
    }
    Ok(true)
}
