// Generation API access: prompt construction and the HTTP client.

pub mod client;
pub mod prompt;
