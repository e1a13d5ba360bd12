pub mod auth;
pub mod engagement;
pub mod explore;
pub mod feed;
pub mod notifications;
pub mod posts;
pub mod search;
pub mod social;
pub mod stories;
pub mod users;
