//! The cache worker: lifecycle, request interception, controlled pages.
//!
//! `LifecycleController` drives Installing -> Activating -> Ready and
//! owns the `RequestInterceptor`, which resolves every fetch event
//! against the current version bucket. `ClientRegistry` tracks the open
//! pages a newly activated version claims.

pub mod clients;
pub mod interceptor;
pub mod lifecycle;

pub use clients::{ClientRegistry, PageClient};
pub use interceptor::{RequestInterceptor, ResolveError};
pub use lifecycle::{LifecycleController, WorkerState};
