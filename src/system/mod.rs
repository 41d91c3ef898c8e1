pub mod config;
pub mod events;
pub mod host;
pub mod session;

pub use config::*;
pub use events::*;
pub use host::*;
pub use session::*;
