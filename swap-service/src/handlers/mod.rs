pub mod admin;
pub mod auth;
pub mod chat;
pub mod health;
pub mod reports;
pub mod requests;
pub mod users;
