use bson::Document;

use super::{FindOptions, Store, StoreError};

/// Deferred `find` over a store; nothing runs until [`Cursor::to_vec`].
pub struct Cursor<'a, S> {
    store: &'a S,
    filter: Document,
    options: FindOptions,
}

impl<'a, S: Store> Cursor<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S, filter: Document, options: FindOptions) -> Self {
        Self { store, filter, options }
    }

    #[must_use]
    pub fn sort(mut self, sort: Document) -> Self {
        self.options.sort = Some(sort);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.options.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn skip(mut self, skip: u64) -> Self {
        self.options.skip = Some(skip);
        self
    }

    #[must_use]
    pub const fn options(&self) -> &FindOptions {
        &self.options
    }

    #[must_use]
    pub const fn filter(&self) -> &Document {
        &self.filter
    }

    /// Runs the query and collects every matching document.
    ///
    /// # Errors
    /// Whatever the store reports for the filter or options.
    pub async fn to_vec(self) -> Result<Vec<Document>, StoreError> {
        self.store.find(&self.filter, &self.options).await
    }
}
