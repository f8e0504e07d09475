pub mod auth;
pub mod blogs;
pub mod collections;
pub mod contact;
pub mod orders;
pub mod products;
