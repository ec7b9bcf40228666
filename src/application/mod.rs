pub mod blobs;
pub mod comments;
pub mod error;
pub mod images;
pub mod posts;
pub mod regen;
pub mod render;
pub mod repos;
pub mod site;
