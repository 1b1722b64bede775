pub mod sender;
pub mod transport;
