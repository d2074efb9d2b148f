use bson::oid::ObjectId;
use bson::{Bson, Document};
use parking_lot::RwLock;

use super::eval::{compare_by_sort, matches, project};
use super::update::apply_update;
use super::{
    DeleteResult, FindOptions, InsertManyResult, InsertOneResult, Store, StoreError, UpdateResult,
};

/// In-process collection implementing [`Store`].
///
/// Documents keep insertion order, which is also the natural order of
/// unsorted reads.
#[derive(Debug, Default)]
pub struct MemoryStore {
    name: String,
    docs: RwLock<Vec<Document>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), docs: RwLock::new(Vec::new()) }
    }

    /// Builds a store pre-filled with `docs`, assigning `_id` where missing.
    ///
    /// # Errors
    /// `DuplicateKey` when two seed documents share an `_id`.
    pub fn with_documents(name: impl Into<String>, docs: Vec<Document>) -> Result<Self, StoreError> {
        let store = Self::new(name);
        {
            let mut guard = store.docs.write();
            for doc in docs {
                insert_into(&mut guard, doc)?;
            }
        }
        Ok(store)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    /// Copy of every stored document in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Document> {
        self.docs.read().clone()
    }

    fn select(&self, filter: &Document, options: &FindOptions) -> Result<Vec<Document>, StoreError> {
        let mut out = Vec::new();
        for doc in self.docs.read().iter() {
            if matches(doc, filter)? {
                out.push(doc.clone());
            }
        }
        if let Some(sort) = &options.sort {
            // Two empty documents tie on every key, so this checks each direction.
            compare_by_sort(&Document::new(), &Document::new(), sort)?;
            out.sort_by(|a, b| compare_by_sort(a, b, sort).unwrap_or(std::cmp::Ordering::Equal));
        }
        let skip = options.skip.map_or(0, to_usize);
        let limit = options.limit.filter(|l| *l > 0).map_or(usize::MAX, to_usize);
        let out = out.into_iter().skip(skip).take(limit);
        match &options.projection {
            Some(p) => out.map(|d| project(&d, p)).collect(),
            None => Ok(out.collect()),
        }
    }
}

fn to_usize(v: u64) -> usize {
    usize::try_from(v).unwrap_or(usize::MAX)
}

fn insert_into(docs: &mut Vec<Document>, doc: Document) -> Result<Bson, StoreError> {
    let doc = if doc.contains_key("_id") {
        doc
    } else {
        let mut with_id = Document::new();
        with_id.insert("_id", ObjectId::new());
        for (k, v) in doc {
            with_id.insert(k, v);
        }
        with_id
    };
    let id = doc.get("_id").cloned().unwrap_or(Bson::Null);
    if docs.iter().any(|d| d.get("_id") == Some(&id)) {
        return Err(StoreError::DuplicateKey(format!("_id {id}")));
    }
    docs.push(doc);
    Ok(id)
}

impl Store for MemoryStore {
    async fn find_one(
        &self,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<Option<Document>, StoreError> {
        let mut options = options.clone();
        options.limit = Some(1);
        Ok(self.select(filter, &options)?.into_iter().next())
    }

    async fn find(
        &self,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let docs = self.select(filter, options)?;
        log::trace!("memory store {} find returned {} documents", self.name, docs.len());
        Ok(docs)
    }

    async fn insert_one(
        &self,
        doc: Document,
        _options: &Document,
    ) -> Result<InsertOneResult, StoreError> {
        let inserted_id = insert_into(&mut self.docs.write(), doc)?;
        Ok(InsertOneResult { inserted_id })
    }

    /// Ordered insert: stops at the first failure, keeping earlier documents.
    async fn insert_many(
        &self,
        docs: Vec<Document>,
        _options: &Document,
    ) -> Result<InsertManyResult, StoreError> {
        let mut guard = self.docs.write();
        let mut result = InsertManyResult::default();
        for (i, doc) in docs.into_iter().enumerate() {
            let id = insert_into(&mut guard, doc)?;
            result.inserted_ids.insert(i, id);
        }
        Ok(result)
    }

    async fn update_many(
        &self,
        filter: &Document,
        update: &Document,
        _options: &Document,
    ) -> Result<UpdateResult, StoreError> {
        let mut guard = self.docs.write();
        let mut result = UpdateResult::default();
        // Apply to copies first so a failing update leaves the collection untouched.
        let mut staged = Vec::new();
        for (i, doc) in guard.iter().enumerate() {
            if matches(doc, filter)? {
                let mut next = doc.clone();
                let changed = apply_update(&mut next, update)?;
                staged.push((i, next, changed));
            }
        }
        for (i, next, changed) in staged {
            result.matched_count += 1;
            if changed {
                result.modified_count += 1;
                guard[i] = next;
            }
        }
        Ok(result)
    }

    async fn replace_one(
        &self,
        filter: &Document,
        replacement: Document,
        _options: &Document,
    ) -> Result<UpdateResult, StoreError> {
        if let Some(key) = replacement.keys().find(|k| k.starts_with('$')) {
            return Err(StoreError::InvalidUpdate(format!(
                "replacement document must not contain operator {key}"
            )));
        }
        let mut guard = self.docs.write();
        let mut position = None;
        for (i, doc) in guard.iter().enumerate() {
            if matches(doc, filter)? {
                position = Some(i);
                break;
            }
        }
        let Some(i) = position else {
            return Ok(UpdateResult::default());
        };
        let id = guard[i].get("_id").cloned().unwrap_or(Bson::Null);
        if let Some(new_id) = replacement.get("_id")
            && *new_id != id
        {
            return Err(StoreError::InvalidUpdate(
                "the _id field cannot be changed by a replacement".into(),
            ));
        }
        let mut next = Document::new();
        next.insert("_id", id);
        for (k, v) in replacement {
            if k != "_id" {
                next.insert(k, v);
            }
        }
        let modified = u64::from(guard[i] != next);
        guard[i] = next;
        Ok(UpdateResult { matched_count: 1, modified_count: modified })
    }

    async fn delete_many(
        &self,
        filter: &Document,
        _options: &Document,
    ) -> Result<DeleteResult, StoreError> {
        let mut guard = self.docs.write();
        // Evaluate everything before removing anything.
        let doomed = guard.iter().map(|d| matches(d, filter)).collect::<Result<Vec<_>, _>>()?;
        let mut flags = doomed.iter();
        guard.retain(|_| !flags.next().copied().unwrap_or(false));
        let deleted = doomed.iter().filter(|d| **d).count() as u64;
        Ok(DeleteResult { deleted_count: deleted })
    }

    async fn count_documents(
        &self,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<u64, StoreError> {
        let counting = FindOptions {
            projection: None,
            sort: None,
            limit: options.limit,
            skip: options.skip,
            native: options.native.clone(),
        };
        Ok(self.select(filter, &counting)?.len() as u64)
    }

    async fn estimated_document_count(&self) -> Result<u64, StoreError> {
        Ok(self.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[tokio::test]
    async fn insert_assigns_id_first() {
        let s = MemoryStore::new("t");
        let r = s.insert_one(doc! {"a": 1}, &Document::new()).await.unwrap();
        assert!(matches!(r.inserted_id, Bson::ObjectId(_)));
        let d = &s.snapshot()[0];
        assert_eq!(d.keys().next().map(String::as_str), Some("_id"));
    }

    #[tokio::test]
    async fn duplicate_ids_rejected() {
        let s = MemoryStore::new("t");
        s.insert_one(doc! {"_id": "a"}, &Document::new()).await.unwrap();
        let err = s.insert_one(doc! {"_id": "a"}, &Document::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));
    }

    #[tokio::test]
    async fn find_sort_skip_limit_project() {
        let s = MemoryStore::with_documents(
            "t",
            vec![
                doc! {"_id": 1, "v": 3, "k": "a"},
                doc! {"_id": 2, "v": 1, "k": "b"},
                doc! {"_id": 3, "v": 2, "k": "c"},
            ],
        )
        .unwrap();
        let opts = FindOptions {
            projection: Some(doc! {"k": 1}),
            sort: Some(doc! {"v": 1}),
            limit: Some(1),
            skip: Some(1),
            native: Document::new(),
        };
        let docs = s.find(&doc! {}, &opts).await.unwrap();
        assert_eq!(docs, vec![doc! {"_id": 3, "k": "c"}]);
    }

    #[tokio::test]
    async fn update_replace_delete() {
        let s = MemoryStore::with_documents(
            "t",
            vec![doc! {"_id": 1, "n": 1}, doc! {"_id": 2, "n": 1}, doc! {"_id": 3, "n": 2}],
        )
        .unwrap();
        let none = Document::new();
        let r = s.update_many(&doc! {"n": 1}, &doc! {"$set": {"m": true}}, &none).await.unwrap();
        assert_eq!(r, UpdateResult { matched_count: 2, modified_count: 2 });

        let r = s.replace_one(&doc! {"_id": 3}, doc! {"fresh": 1}, &none).await.unwrap();
        assert_eq!(r.matched_count, 1);
        assert_eq!(s.snapshot()[2], doc! {"_id": 3, "fresh": 1});

        let r = s.delete_many(&doc! {"m": true}, &none).await.unwrap();
        assert_eq!(r.deleted_count, 2);
        assert_eq!(s.len(), 1);
    }

    #[tokio::test]
    async fn failed_update_leaves_documents() {
        let s = MemoryStore::with_documents("t", vec![doc! {"_id": 1, "n": "x"}]).unwrap();
        let err = s
            .update_many(&doc! {}, &doc! {"$inc": {"n": 1}}, &Document::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidUpdate(_)));
        assert_eq!(s.snapshot(), vec![doc! {"_id": 1, "n": "x"}]);
    }

    #[tokio::test]
    async fn counts() {
        let s = MemoryStore::with_documents("t", vec![doc! {"a": 1}, doc! {"a": 2}]).unwrap();
        let n = s.count_documents(&doc! {"a": 2}, &FindOptions::default()).await.unwrap();
        assert_eq!(n, 1);
        assert_eq!(s.estimated_document_count().await.unwrap(), 2);
    }
}
