//! UI module for Warble
//!
//! Built with iced. The app owns at most one [`Session`](warble_core::session::Session)
//! and talks to the audio thread only through it.

pub mod app;
pub mod message;
pub mod player_view;

pub use app::WarbleApp;
pub use message::Message;
