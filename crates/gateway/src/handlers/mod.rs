//! API handlers module

pub mod chat;
pub mod health;
pub mod products;
pub mod sessions;
