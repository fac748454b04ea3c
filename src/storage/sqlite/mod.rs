mod connection;
mod subscription_repository;
mod article_repository;

pub use connection::SqliteStorage;
pub use subscription_repository::SqliteSubscriptionRepository;
pub use article_repository::SqliteArticleRepository;
