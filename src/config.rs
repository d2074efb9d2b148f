//! Service construction options and per-call parameters.

use std::path::Path;

use bson::Document;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::id::{IdPolicy, NATIVE_ID_FIELD};

/// Page size defaults applied to `find` when pagination is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationOptions {
    pub default: u64,
    #[serde(default)]
    pub max: Option<u64>,
}

impl PaginationOptions {
    #[must_use]
    pub const fn new(default: u64, max: Option<u64>) -> Self {
        Self { default, max }
    }

    /// Applies the default page size and the cap to a requested limit.
    ///
    /// An explicit `0` is kept so callers can ask for the count alone.
    #[must_use]
    pub fn resolve_limit(&self, requested: Option<u64>) -> u64 {
        let limit = requested.unwrap_or(self.default);
        match self.max {
            Some(max) if limit > max => max,
            _ => limit,
        }
    }

    fn validate(&self) -> Result<(), ServiceError> {
        if self.default == 0 {
            return Err(ServiceError::Config("paginate.default must be greater than 0".into()));
        }
        if let Some(max) = self.max
            && max < self.default
        {
            return Err(ServiceError::Config(format!(
                "paginate.max ({max}) is lower than paginate.default ({})",
                self.default
            )));
        }
        Ok(())
    }
}

const fn default_multi() -> bool {
    true
}

fn default_id() -> String {
    NATIVE_ID_FIELD.to_string()
}

/// Service-wide settings. Everything except the store handle, so it can be
/// read from a TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_id")]
    pub id: String,
    #[serde(default)]
    pub disable_objectify: bool,
    #[serde(default)]
    pub use_estimated_document_count: bool,
    #[serde(default)]
    pub paginate: Option<PaginationOptions>,
    /// Allow bulk create/patch/remove (array data or a null id).
    #[serde(default = "default_multi")]
    pub multi: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            id: default_id(),
            disable_objectify: false,
            use_estimated_document_count: false,
            paginate: None,
            multi: true,
        }
    }
}

impl ServiceConfig {
    /// # Errors
    /// Returns `Config` when the TOML is malformed or fails validation.
    pub fn from_toml_str(s: &str) -> Result<Self, ServiceError> {
        let cfg: Self = toml::from_str(s).map_err(|e| ServiceError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    /// Returns `Config` when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ServiceError> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| ServiceError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&s)
    }

    /// # Errors
    /// Returns `Config` for an empty id field or inconsistent pagination.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.id.trim().is_empty() {
            return Err(ServiceError::Config("id field name must not be empty".into()));
        }
        if let Some(p) = &self.paginate {
            p.validate()?;
        }
        Ok(())
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub const fn with_paginate(mut self, paginate: PaginationOptions) -> Self {
        self.paginate = Some(paginate);
        self
    }
}

/// Per-call pagination switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Paginate {
    /// Use the service setting.
    #[default]
    Default,
    /// Return the bare document list for this call.
    Disabled,
    Custom(PaginationOptions),
}

/// Per-call replacements for service-wide settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigOverrides {
    pub use_estimated_document_count: Option<bool>,
    pub disable_objectify: Option<bool>,
}

/// Parameters accompanying every service call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Params {
    /// Filter object including the `$select`/`$sort`/`$limit`/`$skip` pseudo-fields.
    pub query: Document,
    pub paginate: Paginate,
    /// Driver-specific options merged into every store call.
    pub native: Document,
    pub overrides: ConfigOverrides,
}

impl Params {
    #[must_use]
    pub fn with_query(query: Document) -> Self {
        Self { query, ..Self::default() }
    }

    #[must_use]
    pub fn unpaginated(mut self) -> Self {
        self.paginate = Paginate::Disabled;
        self
    }
}

/// Settings in effect for one call after merging `Params` over `ServiceConfig`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOptions {
    pub id: IdPolicy,
    pub paginate: Option<PaginationOptions>,
    pub use_estimated_document_count: bool,
    pub multi: bool,
}

impl ResolvedOptions {
    #[must_use]
    pub fn resolve(config: &ServiceConfig, params: &Params) -> Self {
        let disable_objectify =
            params.overrides.disable_objectify.unwrap_or(config.disable_objectify);
        let paginate = match params.paginate {
            Paginate::Default => config.paginate,
            Paginate::Disabled => None,
            Paginate::Custom(p) => Some(p),
        };
        Self {
            id: IdPolicy::new(config.id.clone(), disable_objectify),
            paginate,
            use_estimated_document_count: params
                .overrides
                .use_estimated_document_count
                .unwrap_or(config.use_estimated_document_count),
            multi: config.multi,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_defaults() {
        let cfg = ServiceConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, ServiceConfig::default());
        assert_eq!(cfg.id, "_id");
        assert!(cfg.multi);
    }

    #[test]
    fn toml_full() {
        let cfg = ServiceConfig::from_toml_str(
            r#"
            id = "key"
            disable_objectify = true
            use_estimated_document_count = true
            multi = false
            [paginate]
            default = 10
            max = 50
            "#,
        )
        .unwrap();
        assert_eq!(cfg.id, "key");
        assert!(cfg.disable_objectify);
        assert!(cfg.use_estimated_document_count);
        assert!(!cfg.multi);
        assert_eq!(cfg.paginate, Some(PaginationOptions::new(10, Some(50))));
    }

    #[test]
    fn rejects_inconsistent_pagination() {
        let err = ServiceConfig::from_toml_str("[paginate]\ndefault = 20\nmax = 5\n").unwrap_err();
        assert!(matches!(err, ServiceError::Config(_)));
        let err = ServiceConfig::from_toml_str("[paginate]\ndefault = 0\n").unwrap_err();
        assert!(matches!(err, ServiceError::Config(_)));
        let err = ServiceConfig::from_toml_str("id = \" \"").unwrap_err();
        assert!(matches!(err, ServiceError::Config(_)));
    }

    #[test]
    fn resolve_limit_caps_and_defaults() {
        let p = PaginationOptions::new(10, Some(50));
        assert_eq!(p.resolve_limit(None), 10);
        assert_eq!(p.resolve_limit(Some(20)), 20);
        assert_eq!(p.resolve_limit(Some(500)), 50);
        assert_eq!(p.resolve_limit(Some(0)), 0);
    }

    #[test]
    fn params_override_service_settings() {
        let cfg = ServiceConfig::default().with_paginate(PaginationOptions::new(5, None));
        let mut params = Params::default();
        params.overrides.use_estimated_document_count = Some(true);
        params.overrides.disable_objectify = Some(true);
        let r = ResolvedOptions::resolve(&cfg, &params);
        assert!(r.use_estimated_document_count);
        assert_eq!(r.paginate, Some(PaginationOptions::new(5, None)));
        assert_eq!(r.id, IdPolicy::new("_id", true));
        let r = ResolvedOptions::resolve(&cfg, &params.unpaginated());
        assert_eq!(r.paginate, None);
    }
}
