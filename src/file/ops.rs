//! パス単位のファイル操作
//!
//! `BasicFile` を作らずに済む単発の問い合わせと作成処理。
//! エラーはすべて `ErrorLogger` を経由して返す。

use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use crate::error::{ErrorContext, ErrorKind, FileError, Result};
use crate::file::basic::BasicFile;
use crate::file::copy;
use crate::file::fs::{FileSystem, OsFileSystem};
use crate::file::handle::Handle;
use crate::file::metadata::{FileInfo, FileMode};
use crate::logging::ErrorLogger;
use crate::options::FileOptions;

/// 新規作成ファイルの権限
pub const NORMAL_MODE: u32 = 0o644;

/// その他ユーザーの読み取りビット
const OTHERS_READ: u32 = 0o004;

#[derive(Debug, Clone)]
pub struct FileOps<S: FileSystem = OsFileSystem> {
    fs: S,
    options: FileOptions,
    logger: ErrorLogger,
}

impl FileOps<OsFileSystem> {
    pub fn new() -> Self {
        Self::with_options(FileOptions::default())
    }

    pub fn with_options(options: FileOptions) -> Self {
        Self::with_file_system(OsFileSystem, options)
    }
}

impl Default for FileOps<OsFileSystem> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: FileSystem> FileOps<S> {
    pub fn with_file_system(fs: S, options: FileOptions) -> Self {
        let logger = options.logger();
        Self {
            fs,
            options,
            logger,
        }
    }

    pub fn with_logger(mut self, logger: ErrorLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn logger(&self) -> &ErrorLogger {
        &self.logger
    }

    /// シンボリックリンクを辿ったメタデータ
    pub fn stat(&self, path: impl AsRef<Path>) -> Result<FileInfo> {
        let path = path.as_ref();
        let metadata = self.fs.metadata(path).with_op("stat", path, &self.logger)?;
        Ok(FileInfo::from_metadata(path, &metadata))
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.fs.metadata(path.as_ref()).is_ok()
    }

    /// 存在しないことが確認できた場合のみ true（権限エラー等では false）
    pub fn not_exists(&self, path: impl AsRef<Path>) -> bool {
        matches!(
            self.fs.metadata(path.as_ref()),
            Err(e) if e.kind() == io::ErrorKind::NotFound
        )
    }

    /// 読み取り可能な通常ファイルであることを確認する
    ///
    /// リンクを解決した上で、その他ユーザーの読み取り権限・
    /// ディレクトリでないこと・通常ファイルであることを順に確認する。
    pub fn stat_check(&self, path: impl AsRef<Path>) -> Result<FileInfo> {
        let path = path.as_ref();
        let real = self
            .fs
            .canonicalize(path)
            .with_op("stat_check", path, &self.logger)?;
        let info = self.stat(&real)?;

        if info.mode.bits() & OTHERS_READ == 0 {
            return Err(self.logger.err(FileError::new(
                ErrorKind::PermissionDenied,
                "stat_check",
                &real,
                "insufficient permissions",
            )));
        }
        if info.is_dir {
            return Err(self
                .logger
                .err(FileError::invalid("stat_check", &real, "is a directory")));
        }
        if !info.is_regular() {
            return Err(self
                .logger
                .err(FileError::invalid("stat_check", &real, "not a regular file")));
        }
        Ok(info)
    }

    /// ファイルモード（取得できなければ空）
    pub fn mode(&self, path: impl AsRef<Path>) -> FileMode {
        self.stat(path).map(|info| info.mode).unwrap_or_default()
    }

    /// 作成または切り詰めて読み書きで開く
    pub fn create(&self, path: impl AsRef<Path>) -> Result<Handle> {
        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true).truncate(true);
        self.create_with(path.as_ref(), "create", options)
    }

    /// 作成または追記モードで開く（既存の内容は保持）
    pub fn create_safe(&self, path: impl AsRef<Path>) -> Result<Handle> {
        let mut options = OpenOptions::new();
        options.read(true).append(true).create(true);
        self.create_with(path.as_ref(), "create_safe", options)
    }

    #[cfg_attr(not(unix), allow(unused_mut))]
    fn create_with(&self, path: &Path, op: &str, mut options: OpenOptions) -> Result<Handle> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(NORMAL_MODE);
        }
        let file = self.fs.open(path, &options).with_op(op, path, &self.logger)?;
        Ok(Handle::new(file, path, true))
    }

    /// ファイルをコピー（ストリーミング）
    pub fn copy(&self, src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<u64> {
        copy::copy_with(&self.fs, src.as_ref(), dst.as_ref()).map_err(|e| self.logger.err(e))
    }
}

impl<S: FileSystem + Clone> FileOps<S> {
    /// 読み取りで開けることを確認してから `BasicFile` を返す
    pub fn open(&self, path: impl AsRef<Path>) -> Result<BasicFile<S>> {
        let path = path.as_ref();
        let mut options = OpenOptions::new();
        options.read(true);
        self.fs.open(path, &options).with_op("open", path, &self.logger)?;
        Ok(self.file(path))
    }

    /// 同じ設定の `BasicFile` を作成（OS呼び出しなし）
    pub fn file(&self, path: impl AsRef<Path>) -> BasicFile<S> {
        BasicFile::with_file_system(path.as_ref(), self.fs.clone(), self.options.clone())
            .with_logger(self.logger.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Sentinel;
    use std::fs;
    use std::io::{Read, Write};
    use tempfile::TempDir;

    #[test]
    fn test_exists_and_not_exists() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("e.txt");
        let ops = FileOps::new();

        assert!(!ops.exists(&path));
        assert!(ops.not_exists(&path));

        fs::write(&path, "x").unwrap();
        assert!(ops.exists(&path));
        assert!(!ops.not_exists(&path));
    }

    #[test]
    fn test_stat_missing_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let err = FileOps::new()
            .stat(temp_dir.path().join("nope"))
            .unwrap_err();
        assert!(err.is(Sentinel::NotFound));
        assert_eq!(err.op(), "stat");
    }

    #[test]
    fn test_create_truncates_and_create_safe_appends() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("c.txt");
        fs::write(&path, "existing").unwrap();
        let ops = FileOps::new();

        ops.create_safe(&path).unwrap().write_all(b"+more").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "existing+more");

        let mut handle = ops.create(&path).unwrap();
        handle.write_all(b"new").unwrap();
        handle.rewind().unwrap();
        let mut content = String::new();
        handle.read_to_string(&mut content).unwrap();
        assert_eq!(content, "new");
    }

    #[cfg(unix)]
    #[test]
    fn test_create_uses_normal_mode() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("m.txt");
        let ops = FileOps::new();
        ops.create(&path).unwrap();

        let perm = ops.mode(&path).perm().bits();
        // umask で削られるのは許容する
        assert_eq!(perm & !NORMAL_MODE, 0);
        assert!(ops.mode(&path).is_regular());
    }

    #[test]
    fn test_open_returns_lazy_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("o.txt");
        let ops = FileOps::new();

        let err = ops.open(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!path.exists());

        fs::write(&path, "opened").unwrap();
        let mut file = ops.open(&path).unwrap();
        assert!(!file.is_open());
        assert_eq!(file.data().unwrap(), b"opened");
    }
}
