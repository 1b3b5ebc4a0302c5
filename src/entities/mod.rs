pub mod acted_in;
pub mod app_user;
pub mod directed;
pub mod genre;
pub mod has_genre;
pub mod movie;
pub mod person;
pub mod rated;
