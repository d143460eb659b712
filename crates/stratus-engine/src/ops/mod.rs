//! S3 operation handlers, grouped by resource.

pub mod bucket;
pub mod list;
pub mod multipart;
pub mod object;
