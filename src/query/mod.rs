//! Translation of abstract query objects into native filters, projections and modifiers.

mod compile;
mod modifier;
mod projection;
mod select;
mod types;

pub use compile::compile_query;
pub use modifier::{ModifierBuilder, UpdateClause};
pub use projection::{build_projection, projection_for, with_id_field};
pub use select::{Selector, select};
pub use types::{CompiledQuery, LIMIT, PSEUDO_FIELDS, QueryOptions, SELECT, SKIP, SORT, Select};
