//! Page and form handlers.

pub mod health;
pub mod home;
pub mod search;
pub mod upload;
