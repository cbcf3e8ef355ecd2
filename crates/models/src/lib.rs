pub mod note;
pub mod pitch;
pub mod codec;
pub mod error;

pub use note::*;
pub use pitch::*;
pub use codec::*;
pub use error::*;
