//! Query Handlers 实现
//!
//! 所有 QueryHandler 的具体实现

mod audio_handlers;
pub(crate) mod project_handlers;
mod scraper_handlers;
mod voice_handlers;

pub use audio_handlers::*;
pub use project_handlers::*;
pub use scraper_handlers::*;
pub use voice_handlers::*;
