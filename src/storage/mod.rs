pub mod kv;
pub mod progress;

pub use kv::*;
pub use progress::*;
