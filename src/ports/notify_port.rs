//! Transient user notifications.

use crate::domain::error::StratifyError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub description: Option<String>,
}

impl Notice {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// `title` plus the short message for `err`.
    pub fn failure(title: &str, err: &StratifyError) -> Self {
        Self::new(title).with_description(err.user_message())
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Passes `result` through, notifying `title` with the short message on
/// failure. A 401 is left alone since the API adapter already redirected.
pub fn reported<T>(
    notifier: &dyn Notifier,
    title: &str,
    result: Result<T, StratifyError>,
) -> Result<T, StratifyError> {
    if let Err(err) = &result {
        if !matches!(err, StratifyError::Unauthorized) {
            notifier.notify(Notice::failure(title, err));
        }
    }
    result
}
