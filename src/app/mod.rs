pub mod clipboard;
pub mod dispatch;
pub mod input;
pub mod repl;
pub mod status;
pub mod style;

pub use dispatch::dispatch;
