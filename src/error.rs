//! Error taxonomy for window queries and the embedding flow.
//!
//! Every native call failure is converted into an [`EmbedError`] at the point of the call.
//! Nothing here retries: native window operations are not assumed idempotent, so the caller
//! decides whether a failure aborts, is reported, or marks a handle as stale.

use thiserror::Error;

use crate::window::WindowHandle;

/// Win32 `ERROR_INVALID_WINDOW_HANDLE`; also what the fake registry reports for dead handles.
pub const ERROR_INVALID_WINDOW_HANDLE: u32 = 1400;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("no window titled '{title}'")]
    HostNotFound { title: String },

    #[error("{op} failed (os error {code})")]
    NativeCall { op: &'static str, code: u32 },

    #[error("reparenting the guest under the host failed (os error {code})")]
    ReparentFailed { code: u32 },

    #[error("window {handle} no longer exists")]
    StaleHandle { handle: WindowHandle },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("owning ui context unavailable: {reason}")]
    UiContextGone { reason: String },

    #[error("failed to schedule geometry measurement")]
    Schedule(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EmbedError>;

impl EmbedError {
    pub fn native(op: &'static str, code: u32) -> Self {
        EmbedError::NativeCall { op, code }
    }

    /// Platform error code carried by native failures, if any.
    pub fn os_code(&self) -> Option<u32> {
        match self {
            EmbedError::NativeCall { code, .. } | EmbedError::ReparentFailed { code } => {
                Some(*code)
            }
            _ => None,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            EmbedError::HostNotFound { .. } => "embed.host_not_found",
            EmbedError::NativeCall { .. } => "embed.native_call_failed",
            EmbedError::ReparentFailed { .. } => "embed.reparent_failed",
            EmbedError::StaleHandle { .. } => "embed.stale_handle",
            EmbedError::NotFound { .. } => "embed.not_found",
            EmbedError::UiContextGone { .. } => "embed.ui_context_gone",
            EmbedError::Schedule(_) => "embed.schedule_failed",
        }
    }

    /// Errors caused by user input rather than the OS (logged as warnings).
    pub fn is_user_error(&self) -> bool {
        matches!(self, EmbedError::HostNotFound { .. })
    }
}
