pub mod score;
pub mod publisher;
pub mod synth;
pub mod sink;
pub mod player;

pub use score::*;
pub use publisher::*;
pub use synth::*;
pub use sink::*;
pub use player::*;
