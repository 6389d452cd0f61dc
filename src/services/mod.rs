pub mod llm;
pub mod parser;
pub mod prompt;
pub mod providers;
pub mod rate_limiter;
pub mod resolver;
pub mod similarity;

pub use llm::{GeminiClient, RetryPolicy, TextGenerator};
pub use rate_limiter::RateLimiter;
pub use resolver::TitleResolver;
pub use similarity::SimilarityService;
