pub mod connection;
pub mod redis_stream;
pub mod message;
pub mod source;
pub mod target;

pub use connection::*;
pub use redis_stream::*;
pub use message::*;
pub use source::*;
pub use target::*;
