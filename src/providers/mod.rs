pub mod deepseek;
pub mod sanitize;
pub mod traits;

pub use deepseek::DeepSeekProvider;
pub use sanitize::sanitize_api_error;
pub use traits::ChatModel;
