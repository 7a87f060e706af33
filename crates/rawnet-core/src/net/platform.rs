pub mod byte_order;

pub use byte_order::Ipv4ByteOrder;

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub use unix::*;

#[cfg(not(unix))]
compile_error!("rawnet supports unix platforms only");
