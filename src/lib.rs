pub mod bridge;
pub mod editor;
pub mod protocol;
pub mod queue;
pub mod terminal;
pub mod writer;

pub use bridge::Bridge;
pub use protocol::{Command, FileUpdate};
