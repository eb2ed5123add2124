//! ファイルモジュール
//!
//! 遅延キャッシュ付きファイル、パス単位の操作、コピー、テキスト・JSON表示を提供

pub mod basic;
pub mod buffer;
pub mod copy;
pub mod fs;
pub mod handle;
pub mod json;
pub mod metadata;
pub mod ops;
pub mod path;
pub mod text;

// 公開API
pub use basic::BasicFile;
pub use buffer::{chunk_multiple, initial_capacity, ContentBuffer, LoadState, CHUNK_SIZE, DEFAULT_BUFFER_SIZE};
pub use copy::{copy, copy_buffer, copy_via_memory};
pub use fs::{FileSystem, OsFileSystem};
pub use handle::{Handle, HandleManager};
pub use json::JsonFile;
pub use metadata::{FileInfo, FileMode, MetadataCache, SysInfo};
pub use ops::FileOps;
pub use path::{clean, PathResolver};
pub use text::TextFile;
