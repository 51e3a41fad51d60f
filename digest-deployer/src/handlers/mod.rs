pub mod push;

pub use push::{receive_push, ACK_BODY};
