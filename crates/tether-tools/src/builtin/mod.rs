//! Built-in tools shipped with the `tether` binary.

mod clock;
mod echo;

use std::sync::Arc;

pub use clock::CurrentTimeTool;
pub use echo::EchoTool;

use crate::registry::ToolRegistry;

/// Register every built-in tool.
pub fn register_builtins(registry: &mut ToolRegistry) {
    registry.register(Arc::new(EchoTool));
    registry.register(Arc::new(CurrentTimeTool));
}
