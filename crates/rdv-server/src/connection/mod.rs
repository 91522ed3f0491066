//! Bridge socket dialing

mod dial;

pub use dial::dial_bridge;
