//! Storage keys and session defaults

use std::time::Duration;

/// Storage key holding the bearer token
pub const TOKEN_KEY: &str = "token";

/// Storage key holding the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Storage key holding the logged-in user profile (JSON text)
pub const USER_KEY: &str = "user";

/// Every key that belongs to a session. Teardown removes all of them.
pub const SESSION_KEYS: [&str; 3] = [TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY];

/// Login entry point the UI is sent to after teardown
pub const DEFAULT_LOGIN_ROUTE: &str = "/pages/login/index";

/// Delay between the expiry notice and navigation to the login route
pub const DEFAULT_NAVIGATE_DELAY: Duration = Duration::from_millis(1500);

/// Notice shown when the session could not be renewed
pub const SESSION_EXPIRED_NOTICE: &str = "Session expired, please log in again";
