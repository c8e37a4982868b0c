//! Network front door of a home media server: a dual-engine HTTP listener and
//! the JSON browse API behind the web control surface.

pub mod cli;
pub mod config;
pub mod content;
pub mod http;
pub mod net;
pub mod server;
