//! HTTP request handlers for the Retroboard web server

pub mod extract;
pub mod health;
pub mod participants;
pub mod types;

pub use health::*;
pub use participants::*;

pub use types::*;
