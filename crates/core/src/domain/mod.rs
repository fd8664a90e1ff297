pub mod catalog;
pub mod conversation;
pub mod label;
pub mod order;
pub mod ticket;
pub mod user;
