//! Store driver contract consumed by the service, plus an in-process backend.

mod cursor;
mod error;
mod eval;
mod memory;
mod model;
mod update;

use std::collections::BTreeMap;
use std::future::Future;

use bson::{Bson, Document};

pub use cursor::Cursor;
pub use error::StoreError;
pub use eval::{compare_bson, compare_by_sort, get_path, matches, project};
pub(crate) use eval::insert_path;
pub use memory::MemoryStore;
pub use model::{Model, ModelSender};
pub use update::apply_update;

/// Options for `find`, `find_one` and `count_documents`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
    /// Driver-specific options, passed through untouched.
    pub native: Document,
}

impl FindOptions {
    /// Starts from the caller's driver-specific options.
    #[must_use]
    pub fn from_native(native: &Document) -> Self {
        Self { native: native.clone(), ..Self::default() }
    }

    #[must_use]
    pub fn with_projection(mut self, projection: Option<Document>) -> Self {
        if projection.is_some() {
            self.projection = projection;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertOneResult {
    pub inserted_id: Bson,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InsertManyResult {
    /// Input position to assigned `_id`.
    pub inserted_ids: BTreeMap<usize, Bson>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

/// A document collection as the service sees it.
///
/// Write methods return driver acknowledgements, not documents; the service
/// re-reads after every write.
pub trait Store: Send + Sync {
    fn find_one(
        &self,
        filter: &Document,
        options: &FindOptions,
    ) -> impl Future<Output = Result<Option<Document>, StoreError>> + Send;

    fn find(
        &self,
        filter: &Document,
        options: &FindOptions,
    ) -> impl Future<Output = Result<Vec<Document>, StoreError>> + Send;

    fn insert_one(
        &self,
        doc: Document,
        options: &Document,
    ) -> impl Future<Output = Result<InsertOneResult, StoreError>> + Send;

    fn insert_many(
        &self,
        docs: Vec<Document>,
        options: &Document,
    ) -> impl Future<Output = Result<InsertManyResult, StoreError>> + Send;

    fn update_many(
        &self,
        filter: &Document,
        update: &Document,
        options: &Document,
    ) -> impl Future<Output = Result<UpdateResult, StoreError>> + Send;

    fn replace_one(
        &self,
        filter: &Document,
        replacement: Document,
        options: &Document,
    ) -> impl Future<Output = Result<UpdateResult, StoreError>> + Send;

    fn delete_many(
        &self,
        filter: &Document,
        options: &Document,
    ) -> impl Future<Output = Result<DeleteResult, StoreError>> + Send;

    fn count_documents(
        &self,
        filter: &Document,
        options: &FindOptions,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    fn estimated_document_count(&self) -> impl Future<Output = Result<u64, StoreError>> + Send;
}
