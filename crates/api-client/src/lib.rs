//! Authenticated API client with single-flight credential refresh
//!
//! Dispatches calls against the application API, unwraps the `{code, data,
//! msg}` envelope, and recovers from an expired bearer token by refreshing it
//! exactly once no matter how many calls hit the 401 at the same time.
//!
//! Call lifecycle:
//! 1. `Dispatcher::dispatch()` attaches the stored credential and sends the call
//! 2. A 401 hands control to `RefreshCoordinator::await_refreshed_credential()`
//! 3. The first caller leads the refresh; later callers queue behind it
//! 4. On success every queued caller replays its call once with the new token
//! 5. On failure every queued caller gets the same error and the session is
//!    torn down once
//!
//! A second 401 after a replay is final. There is no other retry.

pub mod classify;
pub mod config;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod telemetry;
pub mod refresh;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;

pub use classify::{ResponseClass, classify};
pub use config::ClientConfig;
pub use dispatcher::{
    ApiCall, DispatchPhase, DispatchStep, Dispatcher, NETWORK_ERROR_NOTICE, REQUEST_FAILED_NOTICE,
    UNAUTHORIZED_NOTICE, next_step,
};
pub use envelope::{Envelope, SUCCESS_CODE};
pub use error::{ApiError, RefreshError, Result};
pub use refresh::{REFRESH_PATH, RefreshCoordinator};
pub use upload::{AVATAR_UPLOAD_PATH, Uploader};
