mod member;
mod message;
mod party;

pub use member::*;
pub use message::*;
pub use party::*;
