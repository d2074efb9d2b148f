//! Identifier coercion between client-supplied ids and the store's native id type.

use bson::Bson;
use bson::oid::ObjectId;

/// The store-assigned identifier field.
pub const NATIVE_ID_FIELD: &str = "_id";

/// Id handling configured for one service (or one call, after overrides).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdPolicy {
    field: String,
    disable_objectify: bool,
}

impl IdPolicy {
    #[must_use]
    pub fn new(field: impl Into<String>, disable_objectify: bool) -> Self {
        Self { field: field.into(), disable_objectify }
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// True when the configured id field is the store-native `_id`.
    #[must_use]
    pub fn is_native(&self) -> bool {
        self.field == NATIVE_ID_FIELD
    }

    /// Returns the native form of `id` when coercion applies, otherwise `id` unchanged.
    ///
    /// Never fails: values that do not look like an object id pass through and
    /// the store rejects or misses them at lookup time.
    #[must_use]
    pub fn coerce(&self, id: &Bson) -> Bson {
        if self.disable_objectify || !self.is_native() {
            return id.clone();
        }
        match id {
            Bson::String(s) if is_valid_object_id(s) => {
                ObjectId::parse_str(s).map_or_else(|_| id.clone(), Bson::ObjectId)
            }
            _ => id.clone(),
        }
    }

    /// Coerces a filter value on the id field.
    ///
    /// Operator expressions (`{"$in": [...]}`, `{"$ne": ...}`) are coerced
    /// element-wise so membership filters built from string ids still match.
    #[must_use]
    pub fn coerce_filter_value(&self, value: &Bson) -> Bson {
        match value {
            Bson::Document(expr) if expr.keys().all(|k| k.starts_with('$')) => {
                let mut out = bson::Document::new();
                for (op, v) in expr {
                    let coerced = match v {
                        Bson::Array(items) => {
                            Bson::Array(items.iter().map(|i| self.coerce(i)).collect())
                        }
                        other => self.coerce(other),
                    };
                    out.insert(op.clone(), coerced);
                }
                Bson::Document(out)
            }
            other => self.coerce(other),
        }
    }

    /// Fresh key for records created under an application-chosen id field.
    #[must_use]
    pub fn generate_key() -> Bson {
        Bson::String(ObjectId::new().to_hex())
    }
}

impl Default for IdPolicy {
    fn default() -> Self {
        Self::new(NATIVE_ID_FIELD, false)
    }
}

/// Structural validity of a native id string: 24 hexadecimal characters.
#[must_use]
pub fn is_valid_object_id(s: &str) -> bool {
    s.len() == 24 && s.bytes().all(|b| b.is_ascii_hexdigit())
}
