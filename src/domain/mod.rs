pub mod engagement;
pub mod hashtag;
pub mod notification;
pub mod post;
pub mod social_graph;
pub mod story;
pub mod user;
