//! ファイルハンドル管理
//!
//! OSファイルハンドルを初回要求時に開き、明示的な `close` まで保持する。
//! 一時ファイル（`~`）も同じ管理下に置き、`close` で削除する。

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{FileError, Result};
use crate::file::fs::FileSystem;
use crate::options::FileOptions;

/// 開かれたファイルへの排他所有ハンドル
///
/// 下位の `std::fs::File` は公開しない。
#[derive(Debug)]
pub struct Handle {
    file: File,
    path: PathBuf,
    writable: bool,
}

impl Handle {
    pub(crate) fn new(file: File, path: &Path, writable: bool) -> Self {
        Self {
            file,
            path: path.to_path_buf(),
            writable,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// 現在のファイル長（開いているハンドル経由）
    pub fn size(&self) -> io::Result<u64> {
        self.file.metadata().map(|m| m.len())
    }

    pub fn set_len(&self, size: u64) -> io::Result<()> {
        self.file.set_len(size)
    }

    pub fn sync_all(&self) -> io::Result<()> {
        self.file.sync_all()
    }

    pub fn rewind(&mut self) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(0)).map(|_| ())
    }
}

impl Read for Handle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for Handle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for Handle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

/// 主ハンドルと一時ファイルの管理
#[derive(Debug, Default)]
pub struct HandleManager {
    main: Option<Handle>,
    temp: Option<Handle>,
    closed: bool,
}

impl HandleManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.main.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn has_temp(&self) -> bool {
        self.temp.is_some()
    }

    /// 主ハンドルを返す（未オープンなら読み書き・作成付きで開く）
    pub fn get_or_open<S: FileSystem>(
        &mut self,
        fs: &S,
        abs: &Path,
        options: &FileOptions,
    ) -> Result<&mut Handle> {
        if self.closed {
            return Err(FileError::closed("open", abs));
        }
        let handle = match self.main.take() {
            Some(handle) => handle,
            None => open_main(fs, abs, options)?,
        };
        Ok(self.main.insert(handle))
    }

    /// 一時ファイルのハンドルを返す（未作成なら作成）
    pub fn temp_or_create<S: FileSystem>(&mut self, fs: &S, temp: &Path) -> Result<&mut Handle> {
        if self.closed {
            return Err(FileError::closed("open", temp));
        }
        let handle = match self.temp.take() {
            Some(handle) => handle,
            None => {
                let mut options = OpenOptions::new();
                options.read(true).write(true).create(true).truncate(true);
                let file = fs
                    .open(temp, &options)
                    .map_err(|e| FileError::wrap("create", temp, e))?;
                log::debug!("created temp file {}", temp.display());
                Handle::new(file, temp, true)
            }
        };
        Ok(self.temp.insert(handle))
    }

    /// ハンドルを閉じ、以後のオープンを拒否する
    ///
    /// 2回目以降は `Closed` を返す。
    pub fn close<S: FileSystem>(&mut self, fs: &S, name: &Path) -> Result<()> {
        if self.closed {
            return Err(FileError::closed("close", name));
        }
        self.closed = true;
        self.release(fs)
    }

    /// ハンドルを閉じて一時ファイルを削除する（再オープン可能なまま）
    ///
    /// エラーの優先順位: 一時ファイル削除 > 一時ファイルのクローズ > 主ハンドルのクローズ
    pub fn release<S: FileSystem>(&mut self, fs: &S) -> Result<()> {
        let main_result = match self.main.take() {
            Some(handle) => finish(handle),
            None => Ok(()),
        };

        let temp_result = match self.temp.take() {
            Some(handle) => {
                let path = handle.path.clone();
                let closed = finish(handle);
                let removed = fs
                    .remove_file(&path)
                    .map_err(|e| FileError::wrap("remove", &path, e));
                removed.and(closed)
            }
            None => Ok(()),
        };

        temp_result.and(main_result)
    }
}

impl Drop for HandleManager {
    fn drop(&mut self) {
        if let Some(handle) = self.temp.take() {
            let path = handle.path.clone();
            drop(handle);
            if let Err(e) = std::fs::remove_file(&path) {
                log::warn!("failed to remove temp file {}: {}", path.display(), e);
            }
        }
    }
}

fn open_main<S: FileSystem>(fs: &S, abs: &Path, options: &FileOptions) -> Result<Handle> {
    let mut read_write = OpenOptions::new();
    read_write
        .read(true)
        .write(true)
        .create(options.create_if_missing);

    match fs.open(abs, &read_write) {
        Ok(file) => {
            log::debug!("opened {} read-write", abs.display());
            Ok(Handle::new(file, abs, true))
        }
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied && options.read_only_fallback => {
            log::debug!("read-write open denied, retrying {} read-only", abs.display());
            let mut read_only = OpenOptions::new();
            read_only.read(true);
            fs.open(abs, &read_only)
                .map(|file| Handle::new(file, abs, false))
                .map_err(|e| FileError::wrap("open", abs, e))
        }
        Err(e) => Err(FileError::wrap("open", abs, e)),
    }
}

/// 書き込み可能なら同期してから閉じる
fn finish(handle: Handle) -> Result<()> {
    let result = if handle.writable {
        handle
            .sync_all()
            .map_err(|e| FileError::wrap("close", &handle.path, e))
    } else {
        Ok(())
    };
    drop(handle);
    result
}
