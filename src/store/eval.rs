use bson::{Bson, Document};
use std::cmp::Ordering;

use super::StoreError;

// Resource guards for filter evaluation
const MAX_PATH_DEPTH: usize = 32;
const MAX_SORT_FIELDS: usize = 8;

/// Evaluates a mongo-style filter document against `doc`.
///
/// # Errors
/// `InvalidFilter` for unknown operators or malformed operands.
pub fn matches(doc: &Document, filter: &Document) -> Result<bool, StoreError> {
    for (key, cond) in filter {
        let ok = match key.as_str() {
            "$and" => {
                let mut all = true;
                for f in clauses(key, cond)? {
                    if !matches(doc, f)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for f in clauses(key, cond)? {
                    if matches(doc, f)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            "$nor" => {
                let mut none = true;
                for f in clauses(key, cond)? {
                    if matches(doc, f)? {
                        none = false;
                        break;
                    }
                }
                none
            }
            op if op.starts_with('$') => {
                return Err(StoreError::InvalidFilter(format!("unknown top level operator: {op}")));
            }
            path => match_field(get_path(doc, path), cond)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clauses<'a>(op: &str, cond: &'a Bson) -> Result<Vec<&'a Document>, StoreError> {
    let Bson::Array(items) = cond else {
        return Err(StoreError::InvalidFilter(format!("{op} must be an array")));
    };
    if items.is_empty() {
        return Err(StoreError::InvalidFilter(format!("{op} must be a nonempty array")));
    }
    items
        .iter()
        .map(|i| match i {
            Bson::Document(d) => Ok(d),
            _ => Err(StoreError::InvalidFilter(format!("{op} entries must be objects"))),
        })
        .collect()
}

fn is_operator_expr(cond: &Bson) -> bool {
    match cond {
        Bson::Document(d) => !d.is_empty() && d.keys().all(|k| k.starts_with('$')),
        _ => false,
    }
}

fn match_field(value: Option<&Bson>, cond: &Bson) -> Result<bool, StoreError> {
    let Bson::Document(expr) = cond else {
        return Ok(equals(value, cond));
    };
    if !is_operator_expr(cond) {
        return Ok(equals(value, cond));
    }
    for (op, operand) in expr {
        let ok = match op.as_str() {
            "$eq" => equals(value, operand),
            "$ne" => !equals(value, operand),
            "$gt" => compare_with(value, operand, |o| o == Ordering::Greater),
            "$gte" => compare_with(value, operand, |o| o != Ordering::Less),
            "$lt" => compare_with(value, operand, |o| o == Ordering::Less),
            "$lte" => compare_with(value, operand, |o| o != Ordering::Greater),
            "$in" => in_set(value, op, operand)?,
            "$nin" => !in_set(value, op, operand)?,
            "$exists" => value.is_some() == truthy(operand),
            "$not" => !match_field(value, operand)?,
            "$regex" => match_regex(value, operand, expr.get("$options"))?,
            "$options" if expr.contains_key("$regex") => true,
            other => {
                return Err(StoreError::InvalidFilter(format!("unknown operator: {other}")));
            }
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn in_set(value: Option<&Bson>, op: &str, operand: &Bson) -> Result<bool, StoreError> {
    let Bson::Array(set) = operand else {
        return Err(StoreError::InvalidFilter(format!("{op} needs an array")));
    };
    Ok(set.iter().any(|candidate| equals(value, candidate)))
}

/// Equality with array-contains semantics; `null` also matches a missing field.
fn equals(value: Option<&Bson>, expected: &Bson) -> bool {
    match value {
        None => matches!(expected, Bson::Null),
        Some(v) if bson_eq(v, expected) => true,
        Some(Bson::Array(items)) => items.iter().any(|i| bson_eq(i, expected)),
        Some(_) => false,
    }
}

fn compare_with(value: Option<&Bson>, operand: &Bson, pred: impl Fn(Ordering) -> bool) -> bool {
    let check = |v: &Bson| comparable(v, operand) && pred(compare_bson(v, operand));
    match value {
        None => false,
        Some(Bson::Array(items)) => items.iter().any(check),
        Some(v) => check(v),
    }
}

fn truthy(v: &Bson) -> bool {
    match v {
        Bson::Boolean(b) => *b,
        Bson::Null | Bson::Undefined => false,
        Bson::Int32(i) => *i != 0,
        Bson::Int64(i) => *i != 0,
        Bson::Double(f) => *f != 0.0,
        _ => true,
    }
}

#[cfg(feature = "regex")]
fn match_regex(
    value: Option<&Bson>,
    pattern: &Bson,
    options: Option<&Bson>,
) -> Result<bool, StoreError> {
    let Bson::String(pattern) = pattern else {
        return Err(StoreError::InvalidFilter("$regex has to be a string".into()));
    };
    let case_insensitive = options.and_then(Bson::as_str).is_some_and(|o| o.contains('i'));
    let re = regex::RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| StoreError::InvalidFilter(e.to_string()))?;
    Ok(matches!(value, Some(Bson::String(s)) if re.is_match(s)))
}

#[cfg(not(feature = "regex"))]
fn match_regex(
    _value: Option<&Bson>,
    _pattern: &Bson,
    _options: Option<&Bson>,
) -> Result<bool, StoreError> {
    Err(StoreError::InvalidFilter("$regex requires the `regex` feature".into()))
}

/// Orders two documents by a `{field: 1 | -1}` sort specification.
///
/// # Errors
/// `InvalidFilter` when a direction is not 1 or -1, or when there are more
/// than `MAX_SORT_FIELDS` keys.
pub fn compare_by_sort(a: &Document, b: &Document, sort: &Document) -> Result<Ordering, StoreError> {
    if sort.len() > MAX_SORT_FIELDS {
        return Err(StoreError::InvalidFilter(format!(
            "sort has {} keys, at most {MAX_SORT_FIELDS} allowed",
            sort.len()
        )));
    }
    for (field, dir) in sort {
        let descending = match dir {
            Bson::Int32(1) | Bson::Int64(1) => false,
            Bson::Int32(-1) | Bson::Int64(-1) => true,
            Bson::Double(f) if *f == 1.0 => false,
            Bson::Double(f) if *f == -1.0 => true,
            other => {
                return Err(StoreError::InvalidFilter(format!(
                    "invalid sort direction for {field}: {other}"
                )));
            }
        };
        let ord = match (get_path(a, field), get_path(b, field)) {
            (Some(x), Some(y)) => compare_bson(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return Ok(if descending { ord.reverse() } else { ord });
        }
    }
    Ok(Ordering::Equal)
}

/// Resolves a dotted path inside `doc`.
#[must_use]
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut cur = doc;
    let mut parts = path.split('.').enumerate().peekable();
    while let Some((depth, part)) = parts.next() {
        if depth >= MAX_PATH_DEPTH {
            return None;
        }
        let v = cur.get(part)?;
        if parts.peek().is_none() {
            return Some(v);
        }
        match v {
            Bson::Document(d) => cur = d,
            _ => return None,
        }
    }
    None
}

fn is_num(x: &Bson) -> bool {
    matches!(x, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_))
}

#[allow(clippy::cast_precision_loss)]
fn as_f64_num(x: &Bson) -> f64 {
    match x {
        Bson::Int32(i) => f64::from(*i),
        Bson::Int64(i) => *i as f64,
        Bson::Double(f) => *f,
        Bson::Decimal128(d) => d.to_string().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// Numeric values compare equal across Int32/Int64/Double.
fn bson_eq(a: &Bson, b: &Bson) -> bool {
    if is_num(a) && is_num(b) {
        return as_f64_num(a) == as_f64_num(b);
    }
    a == b
}

/// Range operators only match values of the same type class.
fn comparable(a: &Bson, b: &Bson) -> bool {
    (is_num(a) && is_num(b)) || type_rank(a) == type_rank(b)
}

#[must_use]
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if is_num(a) && is_num(b) {
        return as_f64_num(a).total_cmp(&as_f64_num(b));
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

const fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::Symbol(_) | Bson::String(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::DbPointer(_) => 12,
        Bson::JavaScriptCode(_) | Bson::JavaScriptCodeWithScope(_) => 13,
        Bson::MaxKey => 255,
    }
}

/// Applies an inclusion (`{f: 1}`) or exclusion (`{f: 0}`) projection.
///
/// `_id` is kept unless explicitly excluded.
///
/// # Errors
/// `InvalidFilter` when inclusion and exclusion are mixed on non-`_id` fields.
pub fn project(doc: &Document, projection: &Document) -> Result<Document, StoreError> {
    if projection.is_empty() {
        return Ok(doc.clone());
    }
    let mut include = Vec::new();
    let mut exclude = Vec::new();
    let mut keep_id = true;
    for (field, flag) in projection {
        let on = truthy(flag);
        if field == "_id" {
            keep_id = on;
        } else if on {
            include.push(field.as_str());
        } else {
            exclude.push(field.as_str());
        }
    }
    if !include.is_empty() && !exclude.is_empty() {
        return Err(StoreError::InvalidFilter(
            "cannot mix inclusion and exclusion in a projection".into(),
        ));
    }

    if include.is_empty() {
        let mut out = doc.clone();
        for field in exclude {
            remove_path(&mut out, field);
        }
        if !keep_id {
            out.remove("_id");
        }
        return Ok(out);
    }

    let mut out = Document::new();
    if keep_id && let Some(id) = doc.get("_id") {
        out.insert("_id", id.clone());
    }
    for field in include {
        if let Some(v) = get_path(doc, field) {
            insert_path(&mut out, field, v.clone());
        }
    }
    Ok(out)
}

pub(crate) fn insert_path(root: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            root.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(root.get(head), Some(Bson::Document(_))) {
                root.insert(head, Document::new());
            }
            if let Some(Bson::Document(child)) = root.get_mut(head) {
                insert_path(child, rest, value);
            }
        }
    }
}

fn remove_path(root: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            root.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(child)) = root.get_mut(head) {
                remove_path(child, rest);
            }
        }
    }
}
