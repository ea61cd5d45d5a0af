#![forbid(unsafe_code)]

pub mod events;
pub mod files;
mod frame_log;
pub mod loader;
pub mod source;
pub mod xyz;

pub use events::{LoadEmitter, LoadEvent};
pub use files::{append_file, dump, open_file, open_file_streaming, open_source, FileFormat};
pub use loader::{LiveTrajectory, LoadHandle, LoadState, Loader};
pub use source::{read_all, MemorySource, SourceHeader, SourceReader};
pub use xyz::{write_xyz, XyzSource};
