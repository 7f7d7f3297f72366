mod fanout;
mod memory_store;
mod remote_store;
mod sqlite_store;

pub use fanout::*;
pub use memory_store::*;
pub use remote_store::*;
pub use sqlite_store::*;
