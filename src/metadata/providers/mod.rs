//! Provider adapter implementations.

pub mod douban;
pub mod tmdb;

pub use douban::DoubanProvider;
pub use tmdb::TmdbProvider;
