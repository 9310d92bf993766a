//! Request/response plumbing shared by REST modules: parameter validation,
//! cursor pagination, `Accept` negotiation, OK/KO envelopes and API errors.

pub mod envelope;
pub mod error;
pub mod error_layer;
pub mod negotiate;
pub mod pagination;
pub mod validate;

pub use envelope::{created, done, ok, Created, Done, Failure, Success};
pub use error::{ApiError, ApiResult, InternalDetail};
pub use error_layer::{expose_internal_errors, ErrorExposure};
pub use negotiate::ResponseKind;
pub use pagination::{CursorParams, SearchMetadata, SearchParams};
pub use validate::{Bounds, Checked, FieldError, Inputs, Location, Need, Validator};
