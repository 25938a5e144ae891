//! Provider-to-client stream transformation: every upstream's native
//! incremental format collapses into one canonical `chat.completion.chunk`
//! stream here (§4.8), with inline tool-call markers pulled out along the
//! way (§9).

mod tool_call_scanner;
mod transform;

pub use tool_call_scanner::{ScanOutput, ToolCallScanner};
pub use transform::transform_stream;
