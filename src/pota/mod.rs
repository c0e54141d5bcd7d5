pub mod conversion;
pub mod download;
pub mod merge;
