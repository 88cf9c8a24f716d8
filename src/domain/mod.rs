//! Domain types

pub mod chat;

pub use chat::ChatEvent;
