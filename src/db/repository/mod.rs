pub mod booking;
pub mod feed_source;

pub use booking::{BookingRepository, BookingRowWithId};
pub use feed_source::FeedSourceRepository;
