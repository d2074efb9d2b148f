use bson::{Bson, Document, doc};

use super::{Service, inner_params};
use crate::config::{Params, ResolvedOptions};
use crate::errors::ServiceError;
use crate::id::{IdPolicy, NATIVE_ID_FIELD};
use crate::logger::{AUDIT_TARGET, QUERY_TARGET};
use crate::query::{CompiledQuery, ModifierBuilder, SELECT, compile_query, select};
use crate::store::{FindOptions, Store};
use crate::types::{OneOrMany, display_id};

/// Prepares a write intent for the configured id field.
///
/// The native `_id` can never be written, so it is dropped. An
/// application-chosen id field is pinned to the targeted id so a replace
/// cannot orphan the record.
#[must_use]
pub fn normalize_id(policy: &IdPolicy, id: Option<&Bson>, mut data: Document) -> Document {
    if policy.is_native() {
        data.remove(NATIVE_ID_FIELD);
    } else if let Some(id) = id {
        data.insert(policy.field(), id.clone());
    }
    data
}

fn set_id(policy: &IdPolicy, mut doc: Document) -> Document {
    if !policy.is_native() && !doc.contains_key(policy.field()) {
        doc.insert(policy.field(), IdPolicy::generate_key());
    }
    doc
}

fn ensure_multi(opts: &ResolvedOptions, op: &str) -> Result<(), ServiceError> {
    if opts.multi {
        Ok(())
    } else {
        Err(ServiceError::BadRequest(format!("{op} of multiple records is not allowed")))
    }
}

fn with_select(mut query: Document, select: Option<&Bson>) -> Document {
    if let Some(select) = select {
        query.insert(SELECT, select.clone());
    }
    query
}

fn audit(op: &str, id_field: &str, id: Option<&Bson>, count: usize) {
    let target = id.map_or_else(|| "*".to_string(), display_id);
    log::info!(target: AUDIT_TARGET, "{op}: id_field={id_field}, id={target}, count={count}");
}

/// Working state of a patch, split into capture, mutate and refetch.
///
/// The stages run one after another without isolation. A store offering
/// transactions could run all three inside one.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchPlan {
    pub id: Option<Bson>,
    pub filter: Document,
    pub modifier: Document,
    /// `$select` of the original query, reapplied on refetch.
    pub select: Option<Bson>,
    /// Ids matched by `filter` before the update.
    pub captured: Vec<Bson>,
}

impl<S: Store> Service<S> {
    /// Inserts one record or a batch and returns the stored versions.
    ///
    /// Batches come back in input order.
    ///
    /// # Errors
    /// `BadRequest` for a batch when `multi` is off, `Conflict` on duplicate
    /// ids, or another normalized store error.
    pub async fn create(
        &self,
        data: OneOrMany<Document>,
        params: &Params,
    ) -> Result<OneOrMany<Document>, ServiceError> {
        let opts = self.get_options(params);
        let selector = select(&params.query, opts.id.field())?;
        let find = FindOptions::from_native(&params.native);
        let store = self.store().await?;

        let created = match data {
            OneOrMany::One(doc) => {
                let result = store.insert_one(set_id(&opts.id, doc), &params.native).await?;
                let filter = doc! {"_id": result.inserted_id.clone()};
                let stored = store
                    .find_one(&filter, &find)
                    .await?
                    .ok_or_else(|| ServiceError::not_found(&result.inserted_id))?;
                OneOrMany::One(selector.apply(stored))
            }
            OneOrMany::Many(docs) => {
                ensure_multi(&opts, "create")?;
                let docs = docs.into_iter().map(|d| set_id(&opts.id, d)).collect();
                let result = store.insert_many(docs, &params.native).await?;
                let ids: Vec<Bson> = result.inserted_ids.into_values().collect();
                let filter = doc! {"_id": {"$in": ids.clone()}};
                let mut fetched = store.find(&filter, &find).await?;
                let mut ordered = Vec::with_capacity(ids.len());
                for id in &ids {
                    let found = fetched.iter().position(|d| d.get(NATIVE_ID_FIELD) == Some(id));
                    if let Some(pos) = found {
                        ordered.push(fetched.swap_remove(pos));
                    }
                }
                OneOrMany::Many(selector.apply_all(ordered))
            }
        };
        audit("create", opts.id.field(), None, created.len());
        Ok(created)
    }

    /// Partial update of one record (`Some(id)`) or every match (`None`).
    ///
    /// Plain fields are written through `$set`; `$`-prefixed keys are passed
    /// to the store as modifiers.
    ///
    /// # Errors
    /// `NotFound` when `id` matches nothing, `BadRequest` for a bulk patch
    /// when `multi` is off, or a normalized store error.
    pub async fn patch(
        &self,
        id: Option<&Bson>,
        data: Document,
        params: &Params,
    ) -> Result<OneOrMany<Document>, ServiceError> {
        let plan = self.patch_capture(id, data, params).await?;
        self.patch_mutate(&plan, params).await?;
        let patched = self.patch_refetch(&plan, params).await?;
        audit("patch", self.id_field(), id, patched.len());
        Ok(patched)
    }

    /// Compiles the patch and records which ids the filter matches now.
    ///
    /// # Errors
    /// See [`Service::patch`].
    pub async fn patch_capture(
        &self,
        id: Option<&Bson>,
        data: Document,
        params: &Params,
    ) -> Result<PatchPlan, ServiceError> {
        let opts = self.get_options(params);
        if id.is_none() {
            ensure_multi(&opts, "patch")?;
        }
        let data = normalize_id(&opts.id, id, data);
        let modifier = ModifierBuilder::from_data(&data).build();
        let CompiledQuery { filter, .. } = compile_query(&opts.id, id, &params.query)?;

        let mut id_only = filter.clone();
        id_only.insert(SELECT, vec![opts.id.field()]);
        let originals = self.find_or_get(id, &inner_params(params, id_only)).await?;
        let captured = originals
            .into_vec()
            .iter()
            .filter_map(|d| d.get(opts.id.field()).cloned())
            .collect();

        Ok(PatchPlan {
            id: id.cloned(),
            filter,
            modifier,
            select: params.query.get(SELECT).cloned(),
            captured,
        })
    }

    /// Applies the modifier to everything the original filter matches.
    ///
    /// # Errors
    /// A normalized store error.
    pub async fn patch_mutate(&self, plan: &PatchPlan, params: &Params) -> Result<u64, ServiceError> {
        let store = self.store().await?;
        let result = store.update_many(&plan.filter, &plan.modifier, &params.native).await?;
        Ok(result.modified_count)
    }

    /// Re-reads exactly the captured ids, whatever the update did to the
    /// fields the filter matched on.
    ///
    /// # Errors
    /// `NotFound` when the targeted record disappeared in between.
    pub async fn patch_refetch(
        &self,
        plan: &PatchPlan,
        params: &Params,
    ) -> Result<OneOrMany<Document>, ServiceError> {
        let mut query = Document::new();
        query.insert(self.id_field(), doc! {"$in": plan.captured.clone()});
        let query = with_select(query, plan.select.as_ref());
        self.find_or_get(plan.id.as_ref(), &inner_params(params, query)).await
    }

    /// Full replacement of the record with `id`.
    ///
    /// # Errors
    /// `NotFound` when nothing matches `id` together with `params.query`.
    pub async fn update(
        &self,
        id: &Bson,
        data: Document,
        params: &Params,
    ) -> Result<Document, ServiceError> {
        let opts = self.get_options(params);
        let CompiledQuery { filter, .. } = compile_query(&opts.id, Some(id), &params.query)?;
        let replacement = normalize_id(&opts.id, Some(id), data);

        let store = self.store().await?;
        let result = store.replace_one(&filter, replacement, &params.native).await?;
        if result.matched_count == 0 {
            log::debug!(target: QUERY_TARGET, "update: no match for id={}", display_id(id));
            return Err(ServiceError::not_found(id));
        }

        let query = with_select(Document::new(), params.query.get(SELECT));
        let updated = self.get(id, &inner_params(params, query)).await?;
        audit("update", opts.id.field(), Some(id), 1);
        Ok(updated)
    }

    /// Deletes one record or every match, returning what was deleted.
    ///
    /// # Errors
    /// `NotFound` when `id` matches nothing, `BadRequest` for a bulk remove
    /// when `multi` is off, or a normalized store error.
    pub async fn remove(
        &self,
        id: Option<&Bson>,
        params: &Params,
    ) -> Result<OneOrMany<Document>, ServiceError> {
        let opts = self.get_options(params);
        if id.is_none() {
            ensure_multi(&opts, "remove")?;
        }
        let CompiledQuery { filter, .. } = compile_query(&opts.id, id, &params.query)?;

        let snapshot_query = with_select(filter.clone(), params.query.get(SELECT));
        let snapshot = self.find_or_get(id, &inner_params(params, snapshot_query)).await?;

        let store = self.store().await?;
        let result = store.delete_many(&filter, &params.native).await?;
        let deleted = usize::try_from(result.deleted_count).unwrap_or(usize::MAX);
        audit("remove", opts.id.field(), id, deleted);
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_id_is_stripped_from_writes() {
        let out = normalize_id(&IdPolicy::default(), Some(&Bson::Int32(1)), doc! {"_id": 2, "a": 1});
        assert_eq!(out, doc! {"a": 1});
    }

    #[test]
    fn custom_id_is_pinned_to_target() {
        let p = IdPolicy::new("key", false);
        let out = normalize_id(&p, Some(&Bson::String("k1".into())), doc! {"key": "k2", "a": 1});
        assert_eq!(out, doc! {"key": "k1", "a": 1});
        let bulk = normalize_id(&p, None, doc! {"a": 1});
        assert_eq!(bulk, doc! {"a": 1});
    }

    #[test]
    fn set_id_only_for_custom_fields() {
        let d = set_id(&IdPolicy::default(), doc! {"a": 1});
        assert!(!d.contains_key("_id"));
        let d = set_id(&IdPolicy::new("key", false), doc! {"a": 1});
        assert!(matches!(d.get("key"), Some(Bson::String(s)) if s.len() == 24));
        let d = set_id(&IdPolicy::new("key", false), doc! {"key": "mine"});
        assert_eq!(d.get_str("key").unwrap(), "mine");
    }
}
