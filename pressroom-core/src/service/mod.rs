//! Business logic layer

pub mod article;
pub mod view_counter;

pub use article::ArticleService;
pub use view_counter::ViewCounter;
