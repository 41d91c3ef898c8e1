pub mod brewing;
pub mod display;
pub mod system;
pub mod types;

pub use brewing::*;
pub use types::*;
