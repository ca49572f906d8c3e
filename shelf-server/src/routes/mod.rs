mod articles;
mod health;

pub use articles::{create_article, list_articles};
pub use health::health_handler;
