//! Database models split into separate files.
//! Types are re-exported so callers can `use crate::db::models::*`.

pub mod booking;
pub mod feed_source;

pub use self::booking::*;
pub use self::feed_source::*;
