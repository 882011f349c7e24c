//! Content transfer: archive packing and upload progress.

pub mod archive;
pub mod progress_stream;
