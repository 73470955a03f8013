pub mod runtime;
pub mod state;

pub use runtime::{SessionHandle, SessionRuntime};
pub use state::{Phase, ViewState};
