//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `ANT__*` 覆盖
//! （双下划线表示嵌套，如 `ANT__GATEWAY__REQUEST_TIMEOUT_SECS=120`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub gateway: GatewaySection,
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub memory: MemorySection,
}

/// [app] 段：应用名、工作目录、步数预算与纠正上限
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    /// 沙箱根目录，未设置时用 ./workspace
    pub workspace_root: Option<PathBuf>,
    /// 任务落盘目录，未设置时不落盘
    pub task_dir: Option<PathBuf>,
    /// 每任务初始步数预算
    #[serde(default = "default_max_steps_per_task")]
    pub max_steps_per_task: u32,
    /// request_more_steps 每次追加的步数
    #[serde(default = "default_step_increment")]
    pub step_increment: u32,
    /// 格式错误 / 未知工具的纠正重试上限
    #[serde(default = "default_max_correction_retries")]
    pub max_correction_retries: u32,
}

fn default_max_steps_per_task() -> u32 {
    10
}

fn default_step_increment() -> u32 {
    10
}

fn default_max_correction_retries() -> u32 {
    3
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            workspace_root: None,
            task_dir: None,
            max_steps_per_task: default_max_steps_per_task(),
            step_increment: default_step_increment(),
            max_correction_retries: default_max_correction_retries(),
        }
    }
}

/// [gateway] 段：请求超时与回退链（providers 顺序即优先级）
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySection {
    /// 单次模型请求超时（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// 降序优先级的提供商列表
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            providers: Vec::new(),
        }
    }
}

/// [[gateway.providers]] 条目
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEntry {
    pub name: String,
    /// 后端类型：gemini / ollama / scripted
    pub kind: String,
    pub model: String,
    pub endpoint: Option<String>,
    /// 存放 API Key 的环境变量名（不在配置文件里写 Key 本身）
    pub api_key_env: Option<String>,
}

/// [tools] 段：工具超时、Shell 白名单与动态工具清单目录
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    /// 动态工具 TOML 清单目录，未设置时跳过发现
    pub dynamic_dir: Option<PathBuf>,
    #[serde(default)]
    pub shell: ShellSection,
}

fn default_tool_timeout_secs() -> u64 {
    30
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
            dynamic_dir: None,
            shell: ShellSection::default(),
        }
    }
}

/// [tools.shell] 段：允许执行的命令名（仅首词，如 ls、grep、cargo）
#[derive(Debug, Clone, Deserialize)]
pub struct ShellSection {
    #[serde(default = "default_allowed_commands")]
    pub allowed_commands: Vec<String>,
}

impl Default for ShellSection {
    fn default() -> Self {
        Self {
            allowed_commands: default_allowed_commands(),
        }
    }
}

fn default_allowed_commands() -> Vec<String> {
    vec![
        "ls".into(),
        "grep".into(),
        "cat".into(),
        "head".into(),
        "tail".into(),
        "wc".into(),
        "find".into(),
        "echo".into(),
        "mkdir".into(),
        "touch".into(),
        "cargo".into(),
        "rustc".into(),
    ]
}

/// [memory] 段：SQLite 路径与检索参数
#[derive(Debug, Clone, Deserialize)]
pub struct MemorySection {
    /// SQLite 文件路径，未设置时退化为进程内关键词记忆
    pub db_path: Option<PathBuf>,
    /// 每次检索的最大条数
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// 进程内记忆的最大条数（超限丢弃最旧）
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_top_k() -> usize {
    3
}

fn default_max_entries() -> usize {
    1000
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            db_path: None,
            top_k: default_top_k(),
            max_entries: default_max_entries(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            gateway: GatewaySection::default(),
            tools: ToolsSection::default(),
            memory: MemorySection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 ANT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 ANT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("ANT")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
