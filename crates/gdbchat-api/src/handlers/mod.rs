//! API request handlers.

pub mod chat;
pub mod debugger;
pub mod health;
pub mod settings;
pub mod terminal;
pub mod upload;

pub use chat::*;
pub use debugger::*;
pub use health::*;
pub use settings::*;
pub use terminal::*;
pub use upload::*;
