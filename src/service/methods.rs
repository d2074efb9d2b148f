use std::future::Future;

use bson::{Bson, Document};

use super::Service;
use crate::config::Params;
use crate::errors::ServiceError;
use crate::store::Store;
use crate::types::{FindResult, OneOrMany};

/// The six CRUD methods a dispatch framework calls on a service.
///
/// A `None` id addresses every record the query matches and yields
/// `OneOrMany::Many`; a specific id yields `OneOrMany::One`.
pub trait ServiceMethods: Send + Sync {
    fn find(&self, params: &Params) -> impl Future<Output = Result<FindResult, ServiceError>> + Send;

    fn get(
        &self,
        id: &Bson,
        params: &Params,
    ) -> impl Future<Output = Result<Document, ServiceError>> + Send;

    fn create(
        &self,
        data: OneOrMany<Document>,
        params: &Params,
    ) -> impl Future<Output = Result<OneOrMany<Document>, ServiceError>> + Send;

    fn update(
        &self,
        id: &Bson,
        data: Document,
        params: &Params,
    ) -> impl Future<Output = Result<Document, ServiceError>> + Send;

    fn patch(
        &self,
        id: Option<&Bson>,
        data: Document,
        params: &Params,
    ) -> impl Future<Output = Result<OneOrMany<Document>, ServiceError>> + Send;

    fn remove(
        &self,
        id: Option<&Bson>,
        params: &Params,
    ) -> impl Future<Output = Result<OneOrMany<Document>, ServiceError>> + Send;
}

impl<S: Store> ServiceMethods for Service<S> {
    async fn find(&self, params: &Params) -> Result<FindResult, ServiceError> {
        Self::find(self, params).await
    }

    async fn get(&self, id: &Bson, params: &Params) -> Result<Document, ServiceError> {
        Self::get(self, id, params).await
    }

    async fn create(
        &self,
        data: OneOrMany<Document>,
        params: &Params,
    ) -> Result<OneOrMany<Document>, ServiceError> {
        Self::create(self, data, params).await
    }

    async fn update(&self, id: &Bson, data: Document, params: &Params) -> Result<Document, ServiceError> {
        Self::update(self, id, data, params).await
    }

    async fn patch(
        &self,
        id: Option<&Bson>,
        data: Document,
        params: &Params,
    ) -> Result<OneOrMany<Document>, ServiceError> {
        Self::patch(self, id, data, params).await
    }

    async fn remove(
        &self,
        id: Option<&Bson>,
        params: &Params,
    ) -> Result<OneOrMany<Document>, ServiceError> {
        Self::remove(self, id, params).await
    }
}
