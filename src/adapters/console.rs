//! Terminal notifier and route recorder.

use std::sync::Mutex;

use crate::ports::navigation_port::Navigator;
use crate::ports::notify_port::{Notice, Notifier};

/// Prints notices to stderr.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        match notice.description {
            Some(description) => eprintln!("{}: {description}", notice.title),
            None => eprintln!("{}", notice.title),
        }
    }
}

/// Remembers every route the client asked for.
#[derive(Debug, Default)]
pub struct RouteRecorder {
    routes: Mutex<Vec<String>>,
}

impl RouteRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routes(&self) -> Vec<String> {
        self.routes
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<String> {
        self.routes.lock().ok().and_then(|r| r.last().cloned())
    }
}

impl Navigator for RouteRecorder {
    fn navigate(&self, path: &str) {
        tracing::debug!(path, "navigate");
        if let Ok(mut routes) = self.routes.lock() {
            routes.push(path.to_string());
        }
    }
}
