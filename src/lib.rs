//! fastgets：分布式任务调度与爬虫Worker框架
//!
//! 二进制入口见 `main.rs`；这里暴露应用装配与关闭管理，便于集成测试。

pub mod app;
pub mod shutdown;

pub use app::{AppMode, Application};
pub use shutdown::{wait_for_shutdown_signal, ShutdownManager};
