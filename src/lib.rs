mod extract;
mod job;
mod path;
mod pool;
mod summary;

pub use extract::*;
pub use job::*;
pub use path::*;
pub use pool::*;
pub use summary::*;
