//! Novelcast - 网络小说转有声书的一体化处理服务
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Project Context: 处理项目（章节范围、批次、状态机、进度）
//! - 共享服务: 批次规划、章节文本清洗与编号提取
//!
//! 应用层 (application/):
//! - Ports: ChapterFetcher, SpeechSynthesizer, AudioCombiner, ArtifactStorage, ProcessControl, Repository
//! - Commands: 启动 / 暂停 / 继续 / 停止 / 恢复项目 / 清理
//! - Queries: 处理状态、项目列表与详情、文件夹检查、批次音频
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: RESTful API + WebSocket
//! - Memory: ProcessControl 内存实现（单活动项目槽位）
//! - Worker: PipelineWorker 后台流水线
//! - Persistence: SQLite 存储
//! - Adapters: 章节抓取、TTS 客户端、音频合并、文件存储
//! - Events: WebSocket 事件发布

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
