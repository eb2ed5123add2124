//! 結合テスト共通ヘルパー

#![allow(dead_code)]

use basicfile::file::FileSystem;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// OS呼び出しの回数
#[derive(Debug, Default)]
pub struct CallCounts {
    pub current_dir: AtomicUsize,
    pub metadata: AtomicUsize,
    pub canonicalize: AtomicUsize,
    pub open: AtomicUsize,
    pub rename: AtomicUsize,
    pub remove_file: AtomicUsize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        [
            &self.current_dir,
            &self.metadata,
            &self.canonicalize,
            &self.open,
            &self.rename,
            &self.remove_file,
        ]
        .iter()
        .map(|count| count.load(Ordering::SeqCst))
        .sum()
    }
}

/// 呼び出し回数を数えながらOSへ委譲するファイルシステム
#[derive(Debug, Clone, Default)]
pub struct CountingFileSystem {
    pub calls: Arc<CallCounts>,
}

impl CountingFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_dir_calls(&self) -> usize {
        self.calls.current_dir.load(Ordering::SeqCst)
    }

    pub fn metadata_calls(&self) -> usize {
        self.calls.metadata.load(Ordering::SeqCst)
    }

    pub fn open_calls(&self) -> usize {
        self.calls.open.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.total()
    }
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

impl FileSystem for CountingFileSystem {
    fn current_dir(&self) -> io::Result<PathBuf> {
        bump(&self.calls.current_dir);
        std::env::current_dir()
    }

    fn metadata(&self, path: &Path) -> io::Result<fs::Metadata> {
        bump(&self.calls.metadata);
        fs::metadata(path)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        bump(&self.calls.canonicalize);
        fs::canonicalize(path)
    }

    fn open(&self, path: &Path, options: &OpenOptions) -> io::Result<File> {
        bump(&self.calls.open);
        options.open(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        bump(&self.calls.rename);
        fs::rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        bump(&self.calls.remove_file);
        fs::remove_file(path)
    }
}
