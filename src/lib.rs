//! Ant - Rust 自主任务执行智能体
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 任务数据模型、错误类型、任务持久化
//! - **gateway**: 模型网关（提供商回退链 + 响应解码）
//! - **memory**: 长期记忆接口与实现（关键词检索 / SQLite）
//! - **observability**: tracing 初始化
//! - **orchestrator**: 任务编排主循环（状态机）
//! - **tools**: 工具箱（文件、Shell、时间、控制流）与注册表、动态发现

pub mod config;
pub mod core;
pub mod gateway;
pub mod memory;
pub mod observability;
pub mod orchestrator;
pub mod tools;
