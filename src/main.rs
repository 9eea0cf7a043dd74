//! Ant - Rust 自主任务执行智能体
//!
//! 入口：初始化日志、装配网关 / 工具箱 / 记忆与编排器，并运行 REPL 主循环。
//! 每行输入作为一个任务目标执行到终态；任务执行中 Ctrl-C 中止当前任务，
//! 提示符下 Ctrl-C 或 exit/quit 退出。

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use ant::config::{load_config, AppConfig};
use ant::core::TaskPersistence;
use ant::gateway::{
    GeminiProvider, ModelGateway, ModelProvider, OllamaProvider, ProviderAvailability,
};
use ant::memory::{KeywordMemory, MemoryStore, SqliteMemory};
use ant::orchestrator::{OrchestratorLimits, TaskOrchestrator};
use ant::tools::{
    discover_tools, FinishTaskTool, GetCurrentDatetimeTool, ReadFileTool, RequestMoreStepsTool,
    ReturnTextTool, RunShellCommandTool, ToolExecutor, ToolRegistry, WriteFileTool,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ant::observability::init();

    let cfg = load_config(None).context("Failed to load config")?;

    let workspace = cfg
        .app
        .workspace_root
        .clone()
        .unwrap_or_else(|| PathBuf::from("workspace"));
    std::fs::create_dir_all(&workspace).context("Failed to create workspace")?;

    let providers = build_providers(&cfg);
    anyhow::ensure!(
        !providers.is_empty(),
        "no usable model provider configured (check [[gateway.providers]] and API key env vars)"
    );

    // 可用性缓存为进程级：跨任务复用，进程重启即重置
    let gateway = ModelGateway::new(
        providers,
        ProviderAvailability::new(),
        cfg.gateway.request_timeout_secs,
    );

    let shutdown = CancellationToken::new();
    let registry = build_registry(&cfg, &workspace, shutdown.clone());
    let executor = ToolExecutor::new(registry, cfg.tools.tool_timeout_secs);

    let memory = build_memory(&cfg);

    let limits = OrchestratorLimits {
        step_budget: cfg.app.max_steps_per_task,
        step_increment: cfg.app.step_increment,
        max_correction_retries: cfg.app.max_correction_retries,
        memory_top_k: cfg.memory.top_k,
    };
    let mut orchestrator = TaskOrchestrator::new(gateway, executor, memory, limits);
    if let Some(dir) = &cfg.app.task_dir {
        orchestrator = orchestrator.with_persistence(TaskPersistence::new(dir));
    }

    repl(&orchestrator, &shutdown).await
}

/// REPL 主循环：逐行读目标并执行；任务中 Ctrl-C 中止任务而非进程
async fn repl(orchestrator: &TaskOrchestrator, shutdown: &CancellationToken) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("ant> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        let objective = line.trim();
        if objective.is_empty() {
            continue;
        }
        if objective == "exit" || objective == "quit" {
            break;
        }

        let task_cancel = shutdown.child_token();
        let run = orchestrator.run(objective, &task_cancel);
        tokio::pin!(run);
        let task = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                task_cancel.cancel();
                run.await
            }
            task = &mut run => task,
        };

        match &task.status {
            ant::core::TaskStatus::Completed { summary } => println!("completed: {}", summary),
            ant::core::TaskStatus::Failed { reason } => println!("failed: {}", reason),
            ant::core::TaskStatus::Aborted => println!("aborted"),
            other => println!("ended in unexpected state: {:?}", other),
        }
    }

    shutdown.cancel();
    Ok(())
}

/// 按配置装配提供商回退链；缺 API Key 或类型未知的条目跳过并告警
fn build_providers(cfg: &AppConfig) -> Vec<Arc<dyn ModelProvider>> {
    let mut providers: Vec<Arc<dyn ModelProvider>> = Vec::new();
    for entry in &cfg.gateway.providers {
        match entry.kind.as_str() {
            "gemini" => {
                let key_env = entry.api_key_env.as_deref().unwrap_or("GEMINI_API_KEY");
                match std::env::var(key_env) {
                    Ok(key) if !key.is_empty() => providers.push(Arc::new(GeminiProvider::new(
                        &entry.name,
                        &entry.model,
                        key,
                        entry.endpoint.clone(),
                    ))),
                    _ => {
                        tracing::warn!(provider = %entry.name, env = %key_env, "API key not set, provider skipped");
                    }
                }
            }
            "ollama" => providers.push(Arc::new(OllamaProvider::new(
                &entry.name,
                &entry.model,
                entry.endpoint.clone(),
            ))),
            other => {
                tracing::warn!(provider = %entry.name, kind = %other, "unknown provider kind, skipped");
            }
        }
    }
    providers
}

/// 内置工具 + 动态发现（TOML 清单，仅启动时扫描一次）
fn build_registry(cfg: &AppConfig, workspace: &std::path::Path, shutdown: CancellationToken) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(WriteFileTool::new(workspace));
    registry.register(ReadFileTool::new(workspace));
    registry.register(RunShellCommandTool::new(
        workspace,
        cfg.tools.shell.allowed_commands.clone(),
        cfg.tools.tool_timeout_secs,
        shutdown,
    ));
    registry.register(GetCurrentDatetimeTool);
    registry.register(FinishTaskTool);
    registry.register(RequestMoreStepsTool);
    registry.register(ReturnTextTool);

    if let Some(dir) = &cfg.tools.dynamic_dir {
        for tool in discover_tools(dir, workspace, cfg.tools.tool_timeout_secs) {
            registry.register_dynamic(tool);
        }
    }
    registry
}

/// SQLite 打不开时退化为进程内关键词记忆，不阻止启动
fn build_memory(cfg: &AppConfig) -> Arc<dyn MemoryStore> {
    if let Some(path) = &cfg.memory.db_path {
        match SqliteMemory::open(path) {
            Ok(mem) => return Arc::new(mem),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "SQLite memory unavailable, using in-process memory");
            }
        }
    }
    Arc::new(KeywordMemory::new(cfg.memory.max_entries))
}
