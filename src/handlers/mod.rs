mod articles;
mod auth;
mod health;
mod tags;
pub mod util;

pub use articles::{
    create_article, delete_article, get_article, list_articles, update_article,
    update_article_state,
};
pub use auth::issue_token;
pub use health::health_check;
pub use tags::{create_tag, delete_tag, list_tags, update_tag, update_tag_state};
