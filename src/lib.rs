pub mod config;
pub mod errors;
pub mod id;
pub mod logger;
pub mod query;
pub mod service;
pub mod store;
pub mod types;

pub use config::{ConfigOverrides, Paginate, PaginationOptions, Params, ResolvedOptions, ServiceConfig};
pub use errors::ServiceError;
pub use id::IdPolicy;
pub use service::{Service, ServiceMethods, ServiceOptions};
pub use store::{MemoryStore, Model, ModelSender, Store, StoreError};
pub use types::{FindResult, OneOrMany, Paginated};

/// Initializes the data service system.
///
/// Sets up logging from `log4rs.yaml` in the working directory. Call once
/// before building services.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    logger::init()?;
    Ok(())
}
