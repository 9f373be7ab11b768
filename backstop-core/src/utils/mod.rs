//! Shared runtime helpers.

pub mod cancel;
pub(crate) mod lock;
pub mod timer;

pub use cancel::{CancelHandle, new_cancel_handle};
pub use timer::TimerHandle;
