pub mod challenges;
pub mod clipboard;
pub mod cookies;
pub mod countries;
pub mod events;
pub mod notifications;
pub mod router;
pub mod settings;
pub mod translation;
