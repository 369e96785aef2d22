pub mod browser;
pub mod registry;

use std::time::Duration;

pub use browser::{ClickArgs, ClickTool, GetStateTool, GoBackTool, NoArgs};
pub use registry::{parse_args, Tool, ToolRegistry, ToolResult};

/// 浏览器能力集：click / go_back / get_state
pub fn browser_registry(deadline: Duration, max_result_chars: usize) -> ToolRegistry {
    let mut tools = ToolRegistry::new(deadline).with_max_result_chars(max_result_chars);
    tools.register(ClickTool);
    tools.register(GoBackTool);
    tools.register(GetStateTool);
    tools
}
