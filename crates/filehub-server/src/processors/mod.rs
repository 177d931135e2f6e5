//! Queue consumers.
//!
//! Both processors validate the payload before touching the store and
//! re-fetch the referenced record, since it may have changed since enqueue.

pub mod thumbnail;
pub mod welcome;

pub use thumbnail::{THUMBNAIL_WIDTHS, ThumbnailProcessor, generate_thumbnail, thumbnail_path};
pub use welcome::{LogNotifier, Notifier, WelcomeProcessor};
