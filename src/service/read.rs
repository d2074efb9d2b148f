use bson::{Bson, Document};

use super::Service;
use crate::config::Params;
use crate::errors::ServiceError;
use crate::logger::QUERY_TARGET;
use crate::query::{CompiledQuery, compile_query, projection_for};
use crate::store::{Cursor, FindOptions, Store};
use crate::types::{FindResult, OneOrMany, Paginated, display_id};

impl<S: Store> Service<S> {
    /// Single-record read.
    ///
    /// # Errors
    /// `NotFound` when nothing matches `id` together with `params.query`.
    pub async fn get(&self, id: &Bson, params: &Params) -> Result<Document, ServiceError> {
        let opts = self.get_options(params);
        let CompiledQuery { options, filter } = compile_query(&opts.id, Some(id), &params.query)?;
        let projection = projection_for(options.select.as_ref(), opts.id.field());
        let find = FindOptions::from_native(&params.native).with_projection(projection);
        log::debug!(target: QUERY_TARGET, "get: id={}, filter={filter}", display_id(id));

        let store = self.store().await?;
        match store.find_one(&filter, &find).await? {
            Some(doc) => Ok(doc),
            None => {
                log::debug!(target: QUERY_TARGET, "get: no match for id={}", display_id(id));
                Err(ServiceError::not_found(id))
            }
        }
    }

    /// Multi-record read, paginated when the resolved options say so.
    ///
    /// A resolved limit of `0` skips the data query. With pagination the
    /// page still carries the total.
    ///
    /// # Errors
    /// `BadRequest` for malformed pseudo-fields, or a normalized store error.
    pub async fn find(&self, params: &Params) -> Result<FindResult, ServiceError> {
        let opts = self.get_options(params);
        let CompiledQuery { options, filter } = compile_query(&opts.id, None, &params.query)?;
        let projection = projection_for(options.select.as_ref(), opts.id.field());

        let store = self.store().await?;
        let mut cursor = Cursor::new(
            &*store,
            filter.clone(),
            FindOptions::from_native(&params.native).with_projection(projection),
        );
        if let Some(sort) = options.sort {
            cursor = cursor.sort(sort);
        }
        if let Some(skip) = options.skip {
            cursor = cursor.skip(skip);
        }

        let Some(paginate) = opts.paginate else {
            if let Some(limit) = options.limit {
                cursor = cursor.limit(limit);
            }
            log::debug!(
                target: QUERY_TARGET,
                "find: filter={filter}, limit={:?}, skip={:?}",
                options.limit,
                options.skip
            );
            if options.limit == Some(0) {
                return Ok(FindResult::All(Vec::new()));
            }
            return Ok(FindResult::All(cursor.to_vec().await?));
        };

        let limit = paginate.resolve_limit(options.limit);
        let skip = options.skip.unwrap_or(0);
        log::debug!(
            target: QUERY_TARGET,
            "find: filter={filter}, limit={limit}, skip={skip}, estimated={}",
            opts.use_estimated_document_count
        );
        let count_options = FindOptions::from_native(&params.native);
        let count = async {
            if opts.use_estimated_document_count {
                store.estimated_document_count().await
            } else {
                store.count_documents(&filter, &count_options).await
            }
        };
        let data = async {
            if limit == 0 { Ok(Vec::new()) } else { cursor.limit(limit).to_vec().await }
        };
        let (total, data) = tokio::try_join!(count, data)?;
        Ok(FindResult::Page(Paginated { total, limit, skip, data }))
    }

    /// `get` when an id is given, otherwise an unpaginated `find`.
    ///
    /// # Errors
    /// As [`Service::get`] or [`Service::find`].
    pub async fn find_or_get(
        &self,
        id: Option<&Bson>,
        params: &Params,
    ) -> Result<OneOrMany<Document>, ServiceError> {
        match id {
            Some(id) => self.get(id, params).await.map(OneOrMany::One),
            None => {
                let params = params.clone().unpaginated();
                Ok(OneOrMany::Many(self.find(&params).await?.into_data()))
            }
        }
    }
}
