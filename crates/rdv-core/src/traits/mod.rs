//! Core trait definitions

mod multiplexer;

pub use multiplexer::{Multiplexer, WindowHandle};
