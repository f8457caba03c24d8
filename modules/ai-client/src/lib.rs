pub mod error;
pub mod openai;
pub mod traits;
pub mod util;
pub mod zhipu;

pub use error::{AiError, Result};
pub use openai::OpenAi;
pub use traits::{ChatModel, ChatOptions, Message, MessageRole};
pub use util::{extract_json_object, strip_code_blocks};
pub use zhipu::Zhipu;
