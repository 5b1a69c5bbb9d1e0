pub mod event;
pub mod state;
pub mod store;
pub mod timer;

pub use event::*;
pub use state::{clamp_happiness, SessionState, StateDelta};
pub use store::SessionStore;
