//! Trilingo - Persian, English and German translation on a local LLM
//!
//! Detects the language of input text, translates it into the other two
//! supported languages through an external chat-completion engine, and
//! offers a small chat client on the same engine.

pub mod cli;
pub mod config;
pub mod error;
pub mod language;
pub mod detect;
pub mod inference;
pub mod translate;
pub mod store;
pub mod registry;
pub mod loader;
pub mod messaging;
pub mod chat;
