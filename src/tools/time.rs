//! 时间工具

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::Tool;

/// get_current_datetime：返回当前时间（ISO 8601）
#[derive(Debug, Default)]
pub struct GetCurrentDatetimeTool;

#[async_trait]
impl Tool for GetCurrentDatetimeTool {
    fn name(&self) -> &str {
        "get_current_datetime"
    }

    fn description(&self) -> &str {
        "Get the current date and time in ISO 8601 format. No args."
    }

    async fn execute(&self, _args: Value) -> Result<String, String> {
        Ok(chrono::Local::now().to_rfc3339())
    }
}
