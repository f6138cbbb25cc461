//! Command Handlers 实现
//!
//! 所有 CommandHandler 的具体实现

mod cleanup_handlers;
mod process_handlers;
mod speech_handlers;

pub use cleanup_handlers::*;
pub use process_handlers::*;
pub use speech_handlers::*;
