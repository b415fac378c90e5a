mod registry;
mod state;

pub use registry::SessionRegistry;
pub use state::{Session, SessionMode, SessionSnapshot};
