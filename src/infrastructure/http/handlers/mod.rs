//! HTTP Handlers

mod audio;
mod ping;
mod process;
mod project;
mod scraper;
mod voice;
mod websocket;

pub use audio::*;
pub use ping::*;
pub use process::*;
pub use project::*;
pub use scraper::*;
pub use voice::*;
pub use websocket::*;
