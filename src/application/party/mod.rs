mod authorize_write;
mod create_party;
mod join_party;

pub use authorize_write::*;
pub use create_party::*;
pub use join_party::*;
