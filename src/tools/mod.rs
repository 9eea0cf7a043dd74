//! 工具层：注册表、执行器、内置工具与动态发现

pub mod control;
pub mod executor;
pub mod filesystem;
pub mod manifest;
pub mod registry;
pub mod schema;
pub mod shell;
pub mod time;

pub use control::{finish_summary, FinishTaskTool, RequestMoreStepsTool, ReturnTextTool};
pub use executor::ToolExecutor;
pub use filesystem::{ReadFileTool, SafeFs, WriteFileTool};
pub use manifest::{discover_tools, ManifestTool, ToolManifest};
pub use registry::{Tool, ToolRegistry};
pub use schema::tool_call_schema_json;
pub use shell::RunShellCommandTool;
pub use time::GetCurrentDatetimeTool;
