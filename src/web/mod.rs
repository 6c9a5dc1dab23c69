mod context;
pub use context::{AuthenticatedUser, RequestContext, UserRole};

mod error;
pub use error::{ErrorResponse, ValidationError, WebError, WebResult};

pub mod middlewares;

mod state;
pub use state::AppState;

pub mod dto;

pub mod routes;

pub mod doc;
