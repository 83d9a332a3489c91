pub mod error;
pub mod openai;
pub mod tool;
pub mod traits;
pub mod util;

pub use error::AiError;
pub use openai::OpenAi;
pub use tool::{DynTool, Tool, ToolDefinition, ToolWrapper};
pub use traits::{Agent, EmbedAgent, Message, MessageRole, OutputBuilder, PromptBuilder};
pub use util::{strip_code_blocks, truncate_to_char_boundary};
