//! Lowpulse: a persona-driven Telegram autoposter.
//!
//! Posts are generated by a completion provider from a persona file and a
//! weekly theme schedule, deduplicated against history, and delivered over
//! one lazily opened messaging session shared by every workflow (one-shot
//! posts, the chat bot, its daily scheduled post, and the news digest).
//!
//! See `DESIGN.md` for the architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod app;
pub mod autopost;
pub mod bot;
pub mod compose;
pub mod config;
pub mod delivery;
pub mod digest;
pub mod logging;
pub mod providers;
pub mod store;
