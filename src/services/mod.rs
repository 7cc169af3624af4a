pub mod fetcher;
pub mod init;
pub mod reconciler;
pub mod sync;
