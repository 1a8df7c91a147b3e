//! Error Types
//!
//! The main error type [`VitrailError`] covers all failure modes of the
//! runtime: missing contexts, shader compilation/linking, capability gaps and
//! backend failures. All fallible public APIs return [`Result<T>`], an alias
//! for `std::result::Result<T, VitrailError>`.
//!
//! In addition to the typed errors, the runtime keeps the last descriptive
//! failure message (typically a native compiler or linker log) in a
//! process-wide slot. The slot is overwritten by each new failure (it is not
//! a queue), so callers interested in the message must read it after every
//! fallible call.

use parking_lot::Mutex;
use thiserror::Error;

/// The main error type for the Vitrail runtime.
#[derive(Error, Debug)]
pub enum VitrailError {
    // ========================================================================
    // Context Errors
    // ========================================================================
    /// No rendering context is current on the calling thread and no provider
    /// is installed to create a default one.
    #[error("no rendering context is current on this thread")]
    NoContext,

    /// The installed context provider failed to create a native context.
    #[error("failed to create a rendering context: {0}")]
    ContextCreation(String),

    // ========================================================================
    // Shader Errors
    // ========================================================================
    /// The native compiler rejected a shader stage. Contains the compiler log
    /// verbatim. The shader object remains usable but unlinked.
    #[error("shader compilation failed: {0}")]
    ShaderCompile(String),

    /// The native linker rejected the program. Contains the linker log
    /// verbatim. Previously resolved uniform locations are kept.
    #[error("program linking failed: {0}")]
    ShaderLink(String),

    /// A requested feature is not available on the current context.
    #[error("{0} are not available on the current context")]
    Unsupported(&'static str),

    // ========================================================================
    // Backend Errors
    // ========================================================================
    /// The graphics backend reported a failure creating a native object.
    #[error("graphics backend error: {0}")]
    Backend(String),
}

/// Crate-wide result alias.
pub type Result<T, E = VitrailError> = std::result::Result<T, E>;

static LAST_ERROR: Mutex<Option<String>> = Mutex::new(None);

/// Returns the most recent descriptive error message, if any.
///
/// The slot holds native compiler/linker logs and capability messages. It is
/// overwritten by each new failure.
pub fn last_error() -> Option<String> {
    LAST_ERROR.lock().clone()
}

/// Overwrites the process-wide last-error slot.
pub(crate) fn set_last_error(message: impl Into<String>) {
    *LAST_ERROR.lock() = Some(message.into());
}
