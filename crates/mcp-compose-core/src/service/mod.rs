//! Domain services

mod activity_publisher;

pub use activity_publisher::*;
