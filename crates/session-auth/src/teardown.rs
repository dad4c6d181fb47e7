//! Session teardown
//!
//! Runs when the session cannot be renewed: clears every stored key, shows
//! the expiry notice, and sends the UI to the login entry point after a short
//! delay. The UI itself sits behind `Notifier`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::constants::{DEFAULT_LOGIN_ROUTE, DEFAULT_NAVIGATE_DELAY, SESSION_EXPIRED_NOTICE};
use crate::credentials::CredentialStore;

/// User-facing side effects of the request layer.
pub trait Notifier: Send + Sync {
    /// Show a short transient notice.
    fn show_notice(&self, message: &str);

    /// Replace the current screen stack with `route`.
    fn navigate(&self, route: &str);
}

/// Clears the session and routes the user back to login.
pub struct SessionTeardown {
    credentials: CredentialStore,
    notifier: Arc<dyn Notifier>,
    login_route: String,
    navigate_delay: Duration,
}

impl SessionTeardown {
    pub fn new(credentials: CredentialStore, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            credentials,
            notifier,
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
            navigate_delay: DEFAULT_NAVIGATE_DELAY,
        }
    }

    pub fn with_login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    pub fn with_navigate_delay(mut self, delay: Duration) -> Self {
        self.navigate_delay = delay;
        self
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Clear the session, show the notice, and schedule navigation.
    ///
    /// Storage is cleared and the notice shown before this returns. Navigation
    /// runs on a spawned task after `navigate_delay`; outside a tokio runtime
    /// it happens immediately and `None` is returned.
    pub fn run(&self) -> Option<tokio::task::JoinHandle<()>> {
        if let Err(e) = self.credentials.clear() {
            warn!(error = %e, "failed to clear session during teardown");
        }
        self.notifier.show_notice(SESSION_EXPIRED_NOTICE);
        info!(route = %self.login_route, "session torn down");

        let notifier = Arc::clone(&self.notifier);
        let route = self.login_route.clone();
        let delay = self.navigate_delay;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => Some(handle.spawn(async move {
                tokio::time::sleep(delay).await;
                notifier.navigate(&route);
            })),
            Err(_) => {
                notifier.navigate(&route);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{REFRESH_TOKEN_KEY, TOKEN_KEY, USER_KEY};
    use crate::storage::MemoryStorage;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        notices: Mutex<Vec<String>>,
        routes: Mutex<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn show_notice(&self, message: &str) {
            self.notices.lock().unwrap().push(message.to_string());
        }

        fn navigate(&self, route: &str) {
            self.routes.lock().unwrap().push(route.to_string());
        }
    }

    fn logged_in_store() -> CredentialStore {
        CredentialStore::new(Arc::new(MemoryStorage::with_values([
            (TOKEN_KEY, "T1"),
            (REFRESH_TOKEN_KEY, "R1"),
            (USER_KEY, r#"{"id":1}"#),
        ])))
    }

    #[tokio::test(start_paused = true)]
    async fn clears_session_and_navigates_after_delay() {
        let store = logged_in_store();
        let notifier = Arc::new(RecordingNotifier::default());
        let teardown = SessionTeardown::new(store.clone(), notifier.clone());

        let handle = teardown.run().expect("inside a runtime");

        assert!(store.credential().is_none());
        assert!(store.refresh_token().is_none());
        assert!(store.user().is_none());
        assert_eq!(
            notifier.notices.lock().unwrap().as_slice(),
            [SESSION_EXPIRED_NOTICE]
        );
        assert!(notifier.routes.lock().unwrap().is_empty());

        tokio::time::advance(Duration::from_millis(1499)).await;
        tokio::task::yield_now().await;
        assert!(notifier.routes.lock().unwrap().is_empty());

        handle.await.unwrap();
        assert_eq!(
            notifier.routes.lock().unwrap().as_slice(),
            [DEFAULT_LOGIN_ROUTE]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn custom_route_and_delay() {
        let notifier = Arc::new(RecordingNotifier::default());
        let teardown = SessionTeardown::new(logged_in_store(), notifier.clone())
            .with_login_route("/login")
            .with_navigate_delay(Duration::from_millis(10));

        teardown.run().unwrap().await.unwrap();

        assert_eq!(notifier.routes.lock().unwrap().as_slice(), ["/login"]);
    }

    #[test]
    fn navigates_immediately_without_runtime() {
        let notifier = Arc::new(RecordingNotifier::default());
        let teardown = SessionTeardown::new(logged_in_store(), notifier.clone());

        assert!(teardown.run().is_none());
        assert_eq!(
            notifier.routes.lock().unwrap().as_slice(),
            [DEFAULT_LOGIN_ROUTE]
        );
    }
}
