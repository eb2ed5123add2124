//! ホストOSファイルシステムとの境界
//!
//! キャッシュ層が行うOS呼び出しはすべてこのトレイトを経由する。

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// ファイルシステム操作のトレイト
pub trait FileSystem {
    /// プロセスのカレントディレクトリ
    fn current_dir(&self) -> io::Result<PathBuf>;

    /// シンボリックリンクを辿ったメタデータ（stat）
    fn metadata(&self, path: &Path) -> io::Result<fs::Metadata>;

    /// シンボリックリンクを解決した絶対パス
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

    fn open(&self, path: &Path, options: &OpenOptions) -> io::Result<File>;

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// ホストOSへ直接委譲する実装
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn current_dir(&self) -> io::Result<PathBuf> {
        std::env::current_dir()
    }

    fn metadata(&self, path: &Path) -> io::Result<fs::Metadata> {
        fs::metadata(path)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }

    fn open(&self, path: &Path, options: &OpenOptions) -> io::Result<File> {
        options.open(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}
