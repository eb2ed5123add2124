//! ファイル間のバイトコピー
//!
//! 3通りの方式を提供する。いずれもコピーしたバイト数を返し、
//! 失敗は操作名とパスで包んで返す（ログ出力は呼び出し側の責務）。
//!
//! * `copy` - `io::copy` によるストリーミング
//! * `copy_buffer` - 指定サイズのバッファで読み書きを繰り返す
//! * `copy_via_memory` - 全体をメモリへ読み込んでから書き出す

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

use crate::error::{FileError, Result};
use crate::file::buffer::DEFAULT_BUFFER_SIZE;
use crate::file::fs::{FileSystem, OsFileSystem};

pub fn copy(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<u64> {
    copy_with(&OsFileSystem, src.as_ref(), dst.as_ref())
}

pub fn copy_with<S: FileSystem>(fs: &S, src: &Path, dst: &Path) -> Result<u64> {
    let (mut source, mut destination) = open_pair(fs, src, dst)?;
    io::copy(&mut source, &mut destination).map_err(|e| FileError::wrap("copy", src, e))
}

/// `buffer_size` ごとに読み書きする（0 なら既定サイズ）
pub fn copy_buffer(src: impl AsRef<Path>, dst: impl AsRef<Path>, buffer_size: usize) -> Result<u64> {
    copy_buffer_with(&OsFileSystem, src.as_ref(), dst.as_ref(), buffer_size)
}

pub fn copy_buffer_with<S: FileSystem>(
    fs: &S,
    src: &Path,
    dst: &Path,
    buffer_size: usize,
) -> Result<u64> {
    let (mut source, mut destination) = open_pair(fs, src, dst)?;
    let size = if buffer_size == 0 {
        DEFAULT_BUFFER_SIZE
    } else {
        buffer_size
    };

    let mut buf = vec![0u8; size];
    let mut written = 0u64;
    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(FileError::wrap("read", src, e)),
        };
        destination
            .write_all(&buf[..n])
            .map_err(|e| FileError::wrap("write", dst, e))?;
        written += n as u64;
    }
    Ok(written)
}

/// ソース全体を読み込んでから書き出す
pub fn copy_via_memory(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<u64> {
    copy_via_memory_with(&OsFileSystem, src.as_ref(), dst.as_ref())
}

pub fn copy_via_memory_with<S: FileSystem>(fs: &S, src: &Path, dst: &Path) -> Result<u64> {
    let (mut source, mut destination) = open_pair(fs, src, dst)?;
    let mut contents = Vec::new();
    source
        .read_to_end(&mut contents)
        .map_err(|e| FileError::wrap("read", src, e))?;
    destination
        .write_all(&contents)
        .map_err(|e| FileError::wrap("write", dst, e))?;
    Ok(contents.len() as u64)
}

/// ソースが通常ファイルであることを確認し、両端を開く
fn open_pair<S: FileSystem>(fs: &S, src: &Path, dst: &Path) -> Result<(File, File)> {
    let metadata = fs
        .metadata(src)
        .map_err(|e| FileError::wrap("copy", src, e))?;
    if !metadata.is_file() {
        return Err(FileError::invalid("copy", src, "source is not a regular file"));
    }

    let mut read = OpenOptions::new();
    read.read(true);
    let source = fs
        .open(src, &read)
        .map_err(|e| FileError::wrap("open", src, e))?;

    let mut create = OpenOptions::new();
    create.write(true).create(true).truncate(true);
    let destination = fs
        .open(dst, &create)
        .map_err(|e| FileError::wrap("create", dst, e))?;

    Ok((source, destination))
}
