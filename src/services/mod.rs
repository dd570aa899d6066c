pub mod chat;
pub mod events;
pub mod expiry;
pub mod lifecycle;
pub mod scheduling;
