//! Transient user notifications ("toasts").

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
}

impl Toast {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Error,
            message: message.into(),
        }
    }
}

/// Where forms report outcomes to the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// In-process notifier that keeps toasts until a view drains them.
#[derive(Debug, Default)]
pub struct ToastQueue {
    toasts: Mutex<VecDeque<Toast>>,
}

impl ToastQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Toast> {
        self.toasts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }

    pub fn latest(&self) -> Option<Toast> {
        self.toasts.lock().unwrap_or_else(PoisonError::into_inner).back().cloned()
    }

    pub fn len(&self) -> usize {
        self.toasts.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Notifier for ToastQueue {
    fn notify(&self, toast: Toast) {
        tracing::debug!(level = ?toast.level, message = %toast.message, "toast");
        self.toasts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(toast);
    }
}
