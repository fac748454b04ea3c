pub mod traits;
pub mod sqlite;

pub use traits::{ArticleRepository, SubscriptionRepository};
pub use sqlite::{SqliteArticleRepository, SqliteStorage, SqliteSubscriptionRepository};
