//! Memory Layer - In-Memory State Management
//!
//! 实现 ProcessControl，管理活动项目槽位与控制信号

mod process_control;

pub use process_control::InMemoryProcessControl;
