//! 遅延キャッシュ付きファイル
//!
//! `BasicFile` は構築時にOSへ一切触れない。絶対パス・メタデータ・
//! 内容バッファ・OSハンドルはそれぞれ必要になった時点で個別に用意され、
//! 移動・改名で対応するキャッシュが破棄される。
//!
//! `set_data` はメモリ上の内容を置き換えるだけで、ディスクへ書き出すには
//! `sync` を明示的に呼ぶ必要がある。

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{ErrorContext, ErrorKind, FileError, Result, Sentinel};
use crate::file::buffer::{ContentBuffer, LoadState};
use crate::file::copy;
use crate::file::fs::{FileSystem, OsFileSystem};
use crate::file::handle::{Handle, HandleManager};
use crate::file::metadata::{FileInfo, FileMode, MetadataCache, SysInfo};
use crate::file::path::{backup_path, base_name, resolve_absolute, temp_path, PathResolver};
use crate::logging::ErrorLogger;
use crate::options::FileOptions;

/// 1つの論理ファイル
#[derive(Debug)]
pub struct BasicFile<S: FileSystem = OsFileSystem> {
    fs: S,
    options: FileOptions,
    logger: ErrorLogger,
    path: PathResolver,
    metadata: MetadataCache,
    buffer: ContentBuffer,
    handles: HandleManager,
    backup: Option<PathBuf>,
}

impl BasicFile<OsFileSystem> {
    /// 既定オプションで作成（OS呼び出しなし）
    pub fn new(name: impl Into<PathBuf>) -> Self {
        Self::with_options(name, FileOptions::default())
    }

    pub fn with_options(name: impl Into<PathBuf>, options: FileOptions) -> Self {
        Self::with_file_system(name, OsFileSystem, options)
    }
}

impl<S: FileSystem> BasicFile<S> {
    /// ファイルシステム実装を指定して作成
    pub fn with_file_system(name: impl Into<PathBuf>, fs: S, options: FileOptions) -> Self {
        let logger = options.logger();
        Self {
            path: PathResolver::new(name.into(), options.expand_home),
            fs,
            options,
            logger,
            metadata: MetadataCache::new(),
            buffer: ContentBuffer::new(),
            handles: HandleManager::new(),
            backup: None,
        }
    }

    /// ロガーを差し替え
    pub fn with_logger(mut self, logger: ErrorLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn logger(&self) -> &ErrorLogger {
        &self.logger
    }

    pub fn options(&self) -> &FileOptions {
        &self.options
    }

    pub fn file_system(&self) -> &S {
        &self.fs
    }

    /// 構築時に渡された名前（移動・改名後も変わらない）
    pub fn provided_name(&self) -> &Path {
        self.path.provided_name()
    }

    // ========== パス ==========

    /// 絶対パス
    ///
    /// 解決に失敗した場合はエラーを記録して空のパスを返す。
    pub fn abs(&mut self) -> PathBuf {
        self.try_abs().unwrap_or_default()
    }

    pub fn try_abs(&mut self) -> Result<PathBuf> {
        match self.path.resolve(&self.fs) {
            Ok(abs) => Ok(abs.to_path_buf()),
            Err(e) => Err(self.logger.err(e)),
        }
    }

    /// 絶対パスの末尾要素
    pub fn name(&mut self) -> String {
        base_name(&self.abs())
    }

    /// エラー報告用のパス（キャッシュ済みの絶対パス、無ければ現在の名前）
    fn reported_path(&self) -> PathBuf {
        self.path
            .cached()
            .unwrap_or_else(|| self.path.current_name())
            .to_path_buf()
    }

    // ========== メタデータ ==========

    /// メタデータ（初回のみOSへ問い合わせる）
    pub fn stat(&mut self) -> Result<FileInfo> {
        let abs = self.try_abs()?;
        self.metadata
            .stat(&self.fs, &abs)
            .map_err(|e| self.logger.err(e))
    }

    pub fn size(&mut self) -> u64 {
        self.stat().map(|info| info.size).unwrap_or_default()
    }

    pub fn mode(&mut self) -> FileMode {
        self.stat().map(|info| info.mode).unwrap_or_default()
    }

    pub fn mod_time(&mut self) -> SystemTime {
        self.stat()
            .map(|info| info.modified)
            .unwrap_or(SystemTime::UNIX_EPOCH)
    }

    pub fn is_dir(&mut self) -> bool {
        self.stat().map(|info| info.is_dir).unwrap_or(false)
    }

    pub fn is_regular_file(&mut self) -> bool {
        self.stat().map(|info| info.is_regular()).unwrap_or(false)
    }

    pub fn permissions(&mut self) -> FileMode {
        self.stat()
            .map(|info| info.permissions())
            .unwrap_or_default()
    }

    pub fn sys(&mut self) -> SysInfo {
        self.stat().map(|info| info.sys).unwrap_or_default()
    }

    /// キャッシュ済みメタデータを捨てる（次のアクセスで再取得）
    pub fn invalidate_metadata(&mut self) {
        self.metadata.invalidate();
    }

    // ========== 内容 ==========

    /// ファイル内容のコピー
    ///
    /// 未読み込みならディスクから全体を読み込む。読み込んだバイト数が
    /// キャッシュ済みのサイズと異なる場合は `Consistency` エラーとし、
    /// 中途半端な内容は保持しない。
    pub fn data(&mut self) -> Result<Vec<u8>> {
        if !self.buffer.is_loaded() {
            self.load()?;
        }
        Ok(self.buffer.snapshot())
    }

    fn load(&mut self) -> Result<()> {
        let info = self.stat()?;
        let abs = self.try_abs()?;
        if info.is_dir {
            return Err(self
                .logger
                .err(FileError::invalid("read", &abs, "is a directory")));
        }

        let hint = usize::try_from(info.size)
            .unwrap_or(usize::MAX)
            .saturating_add(self.options.min_buffer_size);

        let handle = match self.handles.get_or_open(&self.fs, &abs, &self.options) {
            Ok(handle) => handle,
            Err(e) => return Err(self.logger.err(e)),
        };
        let read = handle
            .rewind()
            .and_then(|()| self.buffer.fill(handle, hint))
            .with_op("read", &abs, &self.logger)? as u64;

        if read != info.size {
            self.buffer.reset();
            return Err(self
                .logger
                .err(FileError::consistency("read", &abs, info.size, read)));
        }

        log::debug!("loaded {} bytes from {}", read, abs.display());
        Ok(())
    }

    /// メモリ上の内容を置き換える（ディスクへは書かない）
    pub fn set_data(&mut self, data: &[u8]) -> Result<usize> {
        match self.buffer.replace(data) {
            Ok(written) => Ok(written),
            Err(e) => Err(self.logger.err(FileError::new(
                ErrorKind::OutOfMemory,
                "set_data",
                self.reported_path(),
                e,
            ))),
        }
    }

    /// 内容と確保領域を解放する（次の `data()` で再読み込み）
    pub fn purge(&mut self) -> Result<()> {
        if self.buffer.purge() {
            return Ok(());
        }
        Err(self.logger.err(FileError::new(
            ErrorKind::OutOfMemory,
            "purge",
            self.reported_path(),
            "buffer capacity not released",
        )))
    }

    pub fn load_state(&self) -> LoadState {
        self.buffer.state()
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// 内容中の `old` をすべて `new` に置き換え、置換回数を返す
    pub fn replace(&mut self, old: &[u8], new: &[u8]) -> Result<usize> {
        if old.is_empty() {
            return Err(self.logger.err(FileError::invalid(
                "replace",
                self.reported_path(),
                "empty search pattern",
            )));
        }

        let current = self.data()?;
        let (replaced, count) = replace_all(&current, old, new);
        let written = self.set_data(&replaced)?;
        if written != replaced.len() {
            return Err(self.logger.err(FileError::new(
                ErrorKind::Io,
                "replace",
                self.reported_path(),
                Sentinel::ShortWrite,
            )));
        }
        Ok(count)
    }

    // ========== ハンドル ==========

    /// OSハンドル（初回は読み書き・作成付きで開く）
    pub fn handle(&mut self) -> Result<&mut Handle> {
        let abs = self.try_abs()?;
        match self.handles.get_or_open(&self.fs, &abs, &self.options) {
            Ok(handle) => Ok(handle),
            Err(e) => Err(self.logger.err(e)),
        }
    }

    pub fn is_open(&self) -> bool {
        self.handles.is_open()
    }

    pub fn is_closed(&self) -> bool {
        self.handles.is_closed()
    }

    /// ハンドルと一時ファイルを解放する
    ///
    /// 以後のハンドル要求と2回目の `close` は `Closed` を返す。
    pub fn close(&mut self) -> Result<()> {
        let name = self.reported_path();
        let result = self.handles.close(&self.fs, &name);
        self.buffer.reset();
        result.map_err(|e| self.logger.err(e))
    }

    /// `dst` へ移動する（既存ファイルがあれば `AlreadyExists`）
    ///
    /// 存在確認と改名の間の競合は検出しない。
    pub fn move_to(&mut self, dst: impl AsRef<Path>) -> Result<()> {
        let src = self.try_abs()?;
        let dst = self.resolve_destination(dst.as_ref())?;
        if self.fs.metadata(&dst).is_ok() {
            return Err(self.logger.err(FileError::already_exists("move", &dst)));
        }
        self.rename_to("move", &src, dst)
    }

    /// `dst` へ改名する（既存ファイルは上書き）
    pub fn rename(&mut self, dst: impl AsRef<Path>) -> Result<()> {
        let src = self.try_abs()?;
        let dst = self.resolve_destination(dst.as_ref())?;
        self.rename_to("rename", &src, dst)
    }

    fn resolve_destination(&self, dst: &Path) -> Result<PathBuf> {
        resolve_absolute(&self.fs, dst, self.options.expand_home).map_err(|e| self.logger.err(e))
    }

    fn rename_to(&mut self, op: &str, src: &Path, dst: PathBuf) -> Result<()> {
        self.handles
            .release(&self.fs)
            .map_err(|e| self.logger.err(e))?;
        self.fs.rename(src, &dst).with_op(op, src, &self.logger)?;
        log::debug!("{} {} -> {}", op, src.display(), dst.display());

        self.path.relocate(dst);
        self.metadata.invalidate();
        self.backup = None;
        self.purge()
    }

    // ========== 退避ファイル ==========

    /// `<abs>.bak` を作成してそのパスを返す（既存の内容は切り詰めない）
    pub fn backup_name(&mut self) -> Result<PathBuf> {
        if let Some(backup) = &self.backup {
            return Ok(backup.clone());
        }

        let backup = backup_path(&self.try_abs()?);
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(false);
        self.fs
            .open(&backup, &options)
            .with_op("backup", &backup, &self.logger)?;

        self.backup = Some(backup.clone());
        Ok(backup)
    }

    /// `<abs>~`（作成はしない）
    pub fn temp_name(&mut self) -> Result<PathBuf> {
        Ok(temp_path(&self.try_abs()?))
    }

    /// 一時ファイルを作成して返す（`close` で削除される）
    pub fn temp_file(&mut self) -> Result<&mut Handle> {
        let temp = self.temp_name()?;
        match self.handles.temp_or_create(&self.fs, &temp) {
            Ok(handle) => Ok(handle),
            Err(e) => Err(self.logger.err(e)),
        }
    }

    pub fn has_temp_file(&self) -> bool {
        self.handles.has_temp()
    }

    /// ディスク上の現在の内容を `.bak` へ複製する
    pub fn write_backup(&mut self) -> Result<u64> {
        let backup = self.backup_name()?;
        let abs = self.try_abs()?;
        copy::copy_with(&self.fs, &abs, &backup).map_err(|e| self.logger.err(e))
    }

    /// メモリ上の内容をディスクへ書き出す
    ///
    /// 未読み込みなら何もしない。失敗しても再試行はしない。
    pub fn sync(&mut self) -> Result<()> {
        if !self.buffer.is_loaded() {
            return Ok(());
        }

        let abs = self.try_abs()?;
        if self.options.backup_on_sync && self.fs.metadata(&abs).is_ok() {
            self.write_backup()?;
        }

        let handle = match self.handles.get_or_open(&self.fs, &abs, &self.options) {
            Ok(handle) => handle,
            Err(e) => return Err(self.logger.err(e)),
        };
        if !handle.is_writable() {
            return Err(self.logger.err(FileError::new(
                ErrorKind::PermissionDenied,
                "sync",
                &abs,
                Sentinel::PermissionDenied,
            )));
        }
        write_through(handle, self.buffer.as_slice()).with_op("sync", &abs, &self.logger)?;

        self.metadata.invalidate();
        log::debug!("synced {} bytes to {}", self.buffer.len(), abs.display());
        Ok(())
    }
}

impl<S: FileSystem> fmt::Display for BasicFile<S> {
    /// キャッシュ済みの情報のみで `"<mode> <name>"` を表示する
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = self.metadata.get().map(|info| info.mode).unwrap_or_default();
        write!(f, "{} {}", mode, base_name(&self.reported_path()))
    }
}

fn write_through(handle: &mut Handle, bytes: &[u8]) -> io::Result<()> {
    handle.set_len(0)?;
    handle.rewind()?;
    handle.write_all(bytes)?;
    handle.sync_all()
}

fn replace_all(haystack: &[u8], old: &[u8], new: &[u8]) -> (Vec<u8>, usize) {
    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    let mut count = 0;

    while let Some(pos) = rest.windows(old.len()).position(|window| window == old) {
        out.extend_from_slice(&rest[..pos]);
        out.extend_from_slice(new);
        rest = &rest[pos + old.len()..];
        count += 1;
    }
    out.extend_from_slice(rest);
    (out, count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_replace_all() {
        let (out, count) = replace_all(b"a-b-c", b"-", b"+=");
        assert_eq!(out, b"a+=b+=c");
        assert_eq!(count, 2);

        let (out, count) = replace_all(b"abc", b"x", b"y");
        assert_eq!(out, b"abc");
        assert_eq!(count, 0);
    }

    #[test]
    fn test_replace_in_buffer() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("r.txt");
        fs::write(&path, "one two one").unwrap();

        let mut file = BasicFile::new(&path);
        assert_eq!(file.replace(b"one", b"1").unwrap(), 2);
        assert_eq!(file.data().unwrap(), b"1 two 1");
        // ディスクは変わらない
        assert_eq!(fs::read_to_string(&path).unwrap(), "one two one");

        let err = file.replace(b"", b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }

    #[test]
    fn test_display_uses_cache_only() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("shown.txt");
        fs::write(&path, "x").unwrap();

        let mut file = BasicFile::new(&path);
        assert_eq!(file.to_string(), "---------- shown.txt");

        file.stat().unwrap();
        assert!(file.to_string().starts_with('-'));
        assert!(file.to_string().ends_with(" shown.txt"));
        assert_ne!(file.mode(), FileMode::default());
    }

    #[test]
    fn test_sync_writes_buffer() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("s.txt");

        let mut file = BasicFile::new(&path);
        file.sync().unwrap();
        assert!(!path.exists());

        file.set_data(b"fresh content").unwrap();
        file.sync().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "fresh content");
        assert_eq!(file.size(), 13);

        file.set_data(b"short").unwrap();
        file.sync().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "short");
    }

    #[test]
    fn test_data_on_directory_is_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let mut file = BasicFile::new(temp_dir.path());
        let err = file.data().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
        assert!(file.is_dir());
    }
}
