pub mod cache;
pub mod tag;
pub mod watch;

pub use cache::QueryCache;
pub use tag::Tag;
pub use watch::{QueryState, Watched};
