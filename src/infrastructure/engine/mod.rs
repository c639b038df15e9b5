//! Built-in agent engines.

pub mod echo;

pub use echo::EchoEngine;
