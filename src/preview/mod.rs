//! Live Preview
//!
//! Editor sessions, the debounced compile scheduler and persisted state.

pub mod scheduler;
pub mod session;
pub mod storage;

use std::time::Duration;

pub use scheduler::{CompileScheduler, CompiledPreview};
pub use session::{EditorSession, SessionSettings};
pub use storage::{ContentStore, CONTENT_KEY};

/// Quiet period after the last edit before compiling
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);
