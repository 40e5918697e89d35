pub mod error;
pub mod frame;
pub mod packet;

pub use error::WireError;
pub use packet::Rpc;
