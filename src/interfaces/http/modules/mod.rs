pub mod chats;
pub mod health;
pub mod metrics;
pub mod relay;
