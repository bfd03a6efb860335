pub mod config;
pub mod env;
pub mod error;
pub mod matcher;
pub mod meeting;
pub mod templates;

pub use config::Config;
pub use error::*;
pub use matcher::classify;
pub use meeting::*;
