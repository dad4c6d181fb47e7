//! Terminal rendition of the UI side effects
//!
//! Notices go to stderr so stdout stays machine-readable. Navigation has no
//! screen stack to replace on a terminal; it tells the user where to go next.

use std::io::Write;
use std::sync::Mutex;

use session_auth::Notifier;
use tracing::info;

/// Notifier writing to any `Write` sink, stderr by default.
pub struct TerminalNotifier {
    out: Mutex<Box<dyn Write + Send>>,
}

impl TerminalNotifier {
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    fn write_line(&self, line: &str) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        // A closed stderr is not worth failing the call over
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }
}

impl Notifier for TerminalNotifier {
    fn show_notice(&self, message: &str) {
        self.write_line(&format!("! {message}"));
    }

    fn navigate(&self, route: &str) {
        info!(route, "navigating to login");
        self.write_line(&format!("-> {route} (run `dingdong-api login --code <CODE>`)"));
    }
}
