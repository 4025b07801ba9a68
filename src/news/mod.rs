//! News items and their persistence.

pub mod repository;
pub mod types;

pub use repository::NewsRepository;
pub use types::{NewsItem, UNTITLED};
