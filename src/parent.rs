//! Parent core types and implementation

mod error;
mod runtime;
mod state;

pub use error::{ParentError, StartError};
pub use runtime::{Message, MessageOutcome, Options, Parent, RestartOpts};
