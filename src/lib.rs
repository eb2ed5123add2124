//! basicfile - 遅延キャッシュ付きファイル抽象化
//!
//! 絶対パス・メタデータ・内容・OSハンドルを必要になるまで用意しない
//! ファイルオブジェクトと、その周辺のファイル操作を提供する。

// コアモジュール
pub mod error;
pub mod logging;
pub mod options;

// ファイル層
pub mod file;

// 公開API
pub use error::{new_error, ErrorContext, ErrorKind, FileError, Result, Sentinel};
pub use file::{BasicFile, FileInfo, FileMode, FileOps, JsonFile, LoadState, TextFile};
pub use logging::{ErrorLogger, LogLevel};
pub use options::FileOptions;
