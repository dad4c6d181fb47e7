//! Session credentials for the API client
//!
//! Owns everything the request core treats as an external collaborator on the
//! credential side: the key/value storage the tokens live in, the typed view
//! over it, and the session teardown that runs when the session cannot be
//! renewed. This crate knows nothing about HTTP.
//!
//! Credential flow:
//! 1. A login response is saved via `CredentialStore::store_login()`
//! 2. The dispatcher reads `CredentialStore::credential()` before each call
//! 3. The refresh coordinator reads `CredentialStore::refresh_token()` on a 401
//! 4. A successful refresh is saved via `CredentialStore::set_credential()`
//! 5. A failed refresh runs `SessionTeardown::run()`, which clears all keys

pub mod constants;
pub mod credentials;
pub mod error;
pub mod storage;
pub mod teardown;

pub use constants::*;
pub use credentials::{Credential, CredentialStore, LoginResult};
pub use error::{Error, Result};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use teardown::{Notifier, SessionTeardown};
