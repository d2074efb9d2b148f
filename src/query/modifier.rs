use bson::{Bson, Document};

/// One entry of a patch payload.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateClause {
    /// Plain field, written through `$set`.
    Assign(String, Bson),
    /// Caller-built modifier such as `$inc` or `$unset`, merged at the top level.
    Raw(String, Bson),
}

impl UpdateClause {
    #[must_use]
    pub fn classify(key: &str, value: Bson) -> Self {
        if key.starts_with('$') {
            Self::Raw(key.to_string(), value)
        } else {
            Self::Assign(key.to_string(), value)
        }
    }
}

/// Collects clauses into a native update document.
#[derive(Debug, Default, Clone)]
pub struct ModifierBuilder {
    set: Document,
    raw: Document,
}

impl ModifierBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies every key of a write intent.
    #[must_use]
    pub fn from_data(data: &Document) -> Self {
        let mut builder = Self::new();
        for (key, value) in data {
            builder.push(UpdateClause::classify(key, value.clone()));
        }
        builder
    }

    pub fn push(&mut self, clause: UpdateClause) {
        match clause {
            UpdateClause::Assign(field, value) => {
                self.set.insert(field, value);
            }
            UpdateClause::Raw(op, value) => {
                self.raw.insert(op, value);
            }
        }
    }

    /// Plain assignments become `$set`; raw modifiers are merged beside it.
    ///
    /// A raw `$set` is merged with the plain assignments, plain fields winning.
    #[must_use]
    pub fn build(self) -> Document {
        let Self { set, mut raw } = self;
        if !set.is_empty() {
            let merged = match raw.remove("$set") {
                Some(Bson::Document(mut explicit)) => {
                    for (k, v) in set {
                        explicit.insert(k, v);
                    }
                    explicit
                }
                _ => set,
            };
            raw.insert("$set", merged);
        }
        raw
    }
}
