//! Wire types shared by every request parser and stream transformer:
//! the OpenAI-compatible chat completion request DTOs, the
//! `chat.completion.chunk` response shape, and the SSE line framing both
//! sides agree on.

pub mod chunk;
pub mod request;
pub mod response;
pub mod sse;

pub use chunk::{
    ChatCompletionChunk, ChunkChoice, ChunkMeta, ChunkUsage, Delta, DeltaToolCall,
    DeltaToolCallFunction,
};
pub use request::{
    ChatCompletionRequest, ChatMessage, ContentPart, ForcedFunction, MessageContent,
    StreamOptions, ToolChoice, ToolFunctionSpec, ToolSpec,
};
pub use response::{
    ChatCompletionResponse, ResponseChoice, ResponseMessage, ResponseToolCall,
    ResponseToolCallFunction, ResponseUsage,
};
pub use sse::{write_sse_line, DONE_LINE};
