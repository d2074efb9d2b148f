//! The data service: read path, write reconciliation and the CRUD facade.
//!
//! Multi-step writes (patch, update, remove) are not atomic. A concurrent
//! writer can slip between the capture, mutate and refetch stages; results
//! are eventually consistent with the store.

mod methods;
mod read;
mod write;

use std::sync::Arc;

use bson::Document;

pub use methods::ServiceMethods;
pub use write::{PatchPlan, normalize_id};

use crate::config::{Params, ResolvedOptions, ServiceConfig};
use crate::errors::ServiceError;
use crate::store::{Model, Store};

/// Construction surface for [`Service`].
#[derive(Debug)]
pub struct ServiceOptions<S> {
    pub model: Option<Model<S>>,
    pub config: ServiceConfig,
}

impl<S> ServiceOptions<S> {
    #[must_use]
    pub const fn new(model: Model<S>, config: ServiceConfig) -> Self {
        Self { model: Some(model), config }
    }
}

impl<S> Default for ServiceOptions<S> {
    fn default() -> Self {
        Self { model: None, config: ServiceConfig::default() }
    }
}

/// CRUD service over one collection.
#[derive(Debug)]
pub struct Service<S> {
    model: Model<S>,
    config: ServiceConfig,
}

impl<S> Clone for Service<S> {
    fn clone(&self) -> Self {
        Self { model: self.model.clone(), config: self.config.clone() }
    }
}

impl<S: Store> Service<S> {
    /// # Errors
    /// `Config` when no model is given or the configuration is inconsistent.
    pub fn new(options: ServiceOptions<S>) -> Result<Self, ServiceError> {
        let ServiceOptions { model, config } = options;
        let Some(model) = model else {
            return Err(ServiceError::Config("a model must be provided".into()));
        };
        config.validate()?;
        log::info!("service: id_field={}, model={model:?}", config.id);
        Ok(Self { model, config })
    }

    #[must_use]
    pub const fn config(&self) -> &ServiceConfig {
        &self.config
    }

    #[must_use]
    pub fn id_field(&self) -> &str {
        &self.config.id
    }

    #[must_use]
    pub const fn model(&self) -> &Model<S> {
        &self.model
    }

    /// Per-call settings: `params` merged over the service configuration.
    #[must_use]
    pub fn get_options(&self, params: &Params) -> ResolvedOptions {
        ResolvedOptions::resolve(&self.config, params)
    }

    /// Resolves the store handle; done again on every call.
    async fn store(&self) -> Result<Arc<S>, ServiceError> {
        Ok(self.model.resolve().await?)
    }
}

/// `params` with its query replaced and pagination turned off.
fn inner_params(params: &Params, query: Document) -> Params {
    Params { query, ..params.clone() }.unpaginated()
}
