//! Background dispatch: runs external highlight requests off the caller's
//! thread and reports back over a channel.

mod message;
mod runtime;

pub use message::HighlightMessage;
pub use runtime::HighlightRuntime;
