pub mod groq;
pub mod openai;

pub use groq::GroqClient;
pub use openai::OpenAiClient;
