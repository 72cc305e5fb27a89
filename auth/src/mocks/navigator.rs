//! Mock navigator for testing.

use crate::error::{AuthError, Result};
use crate::providers::Navigator;
use std::sync::{Arc, Mutex, PoisonError};

/// Navigator that records every URL instead of leaving the page.
///
/// Clones share the recorded history.
#[derive(Debug, Clone, Default)]
pub struct RecordingNavigator {
    visited: Arc<Mutex<Vec<String>>>,
    refuse: bool,
}

impl RecordingNavigator {
    /// Create a navigator that accepts every navigation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a navigator that refuses every navigation.
    #[must_use]
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    /// Every URL navigated to, oldest first.
    #[must_use]
    pub fn visited(&self) -> Vec<String> {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent URL.
    #[must_use]
    pub fn last(&self) -> Option<String> {
        self.visited().pop()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &str) -> Result<()> {
        if self.refuse {
            return Err(AuthError::Transport(format!("navigation to {url} refused")));
        }
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
        Ok(())
    }
}
