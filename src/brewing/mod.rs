pub mod clock;
pub mod projector;
pub mod states;

pub use clock::*;
pub use states::*;
