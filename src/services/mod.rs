pub mod article_service;
pub mod refresh_service;
pub mod subscription_service;

pub use article_service::{ArticleService, DEFAULT_ARTICLE_LIMIT};
pub use refresh_service::{RefreshReport, RefreshService};
pub use subscription_service::SubscriptionService;
