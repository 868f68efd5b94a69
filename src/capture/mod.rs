pub mod buffer;
pub mod session;
pub mod supervisor;

pub use buffer::Buffer;
pub use session::{Artifact, Config, Output, Session, State, Task};
pub use supervisor::{Handle, Stopped};
