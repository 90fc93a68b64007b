//! Client core for the campus administration backend.
//!
//! # Overview
//! Two collaborating pieces sit between the admin UI and the REST backend:
//!
//! - [`DataAdapter`] turns list/get-one/create/update/custom calls into HTTP
//!   requests and normalizes every response envelope into [`ListResult`] or a
//!   single record, classifying failures into one [`AdapterError`] shape.
//! - [`SessionGateway`] drives the cookie session: login, registration,
//!   logout, session checks, identity and permissions, and the policy for
//!   reacting to a 401.
//!
//! # Design
//! - Request building and response parsing are pure (`build_*` / `parse_*`);
//!   only the injected [`Transport`] performs I/O.
//! - Both components are constructed from the same `Arc` transport so the
//!   session cookie set by sign-in is attached to every data call.
//! - Nothing is cached across calls; the backend is the source of truth.

pub mod adapter;
pub mod config;
pub mod error;
pub mod http;
pub mod normalize;
pub mod query;
pub mod session;
pub mod transport;

pub use adapter::{CustomRequest, DataAdapter};
pub use config::ClientConfig;
pub use error::{classify, AdapterError, ConfigError, DataError, ErrorKind, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use normalize::ListResult;
pub use query::{translate, FilterOperator, FilterPredicate, Pagination, QueryDescriptor, QueryParams, SortOrder, Sorter};
pub use session::{
    AuthFailure, AuthSuccess, CheckResponse, Identity, OnErrorResponse, Permissions, ProfileUpdate, Role, SessionGateway,
    SessionState, SignUpPayload,
};
pub use transport::{ReqwestTransport, Transport};

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber honoring `RUST_LOG` (default `info`).
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Build a data adapter and a session gateway that share one cookie-carrying
/// transport.
pub fn connect(config: ClientConfig) -> Result<(DataAdapter<ReqwestTransport>, SessionGateway<ReqwestTransport>), ConfigError> {
    let transport = Arc::new(ReqwestTransport::new(&config)?);
    Ok((
        DataAdapter::new(config.clone(), Arc::clone(&transport)),
        SessionGateway::new(config, transport),
    ))
}
