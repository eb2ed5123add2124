//! ファイルメタデータ管理
//!
//! 初回アクセス時に一度だけ stat し、明示的に無効化されるまで保持する。
//! スナップショットなので外部でファイルが変わっても自動更新はしない。

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

use crate::error::{FileError, Result};
use crate::file::fs::FileSystem;
use crate::file::path::base_name;

/// ファイルモード（種別ビット＋権限ビット）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FileMode(u32);

impl FileMode {
    pub const TYPE_MASK: u32 = 0o170_000;
    pub const DIR: u32 = 0o040_000;
    pub const REGULAR: u32 = 0o100_000;
    pub const SYMLINK: u32 = 0o120_000;
    pub const PERM_MASK: u32 = 0o777;

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[cfg(unix)]
    pub fn from_metadata(metadata: &fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self(metadata.mode())
    }

    #[cfg(not(unix))]
    pub fn from_metadata(metadata: &fs::Metadata) -> Self {
        let file_type = metadata.file_type();
        let kind = if file_type.is_dir() {
            Self::DIR
        } else if file_type.is_symlink() {
            Self::SYMLINK
        } else if file_type.is_file() {
            Self::REGULAR
        } else {
            0
        };
        let perm = match (file_type.is_dir(), metadata.permissions().readonly()) {
            (true, _) => 0o755,
            (false, true) => 0o444,
            (false, false) => 0o644,
        };
        Self(kind | perm)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn is_dir(self) -> bool {
        self.0 & Self::TYPE_MASK == Self::DIR
    }

    pub fn is_regular(self) -> bool {
        self.0 & Self::TYPE_MASK == Self::REGULAR
    }

    pub fn is_symlink(self) -> bool {
        self.0 & Self::TYPE_MASK == Self::SYMLINK
    }

    /// 権限ビットのみ
    pub fn perm(self) -> FileMode {
        FileMode(self.0 & Self::PERM_MASK)
    }

    /// 種別ビットのみ
    pub fn file_type(self) -> FileMode {
        FileMode(self.0 & Self::TYPE_MASK)
    }
}

impl fmt::Display for FileMode {
    /// `ls -l` 形式（例: `-rw-r--r--`, `drwxr-xr-x`）
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.0 & Self::TYPE_MASK {
            Self::DIR => 'd',
            Self::SYMLINK => 'l',
            _ => '-',
        };
        let mut out = String::with_capacity(10);
        out.push(kind);
        for shift in [6u32, 3, 0] {
            let bits = (self.0 >> shift) & 0o7;
            out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
            out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
            out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
        }
        f.write_str(&out)
    }
}

/// プラットフォーム固有の情報
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SysInfo {
    pub dev: u64,
    pub ino: u64,
    pub nlink: u64,
    pub uid: u32,
    pub gid: u32,
}

impl SysInfo {
    #[cfg(unix)]
    fn from_metadata(metadata: &fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
            nlink: metadata.nlink(),
            uid: metadata.uid(),
            gid: metadata.gid(),
        }
    }

    #[cfg(not(unix))]
    fn from_metadata(_metadata: &fs::Metadata) -> Self {
        Self::default()
    }
}

/// メタデータのスナップショット
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// ファイル名（末尾要素）
    pub name: String,
    pub size: u64,
    pub mode: FileMode,
    pub modified: SystemTime,
    pub is_dir: bool,
    pub sys: SysInfo,
}

impl FileInfo {
    pub fn from_metadata(path: &Path, metadata: &fs::Metadata) -> Self {
        Self {
            name: base_name(path),
            size: metadata.len(),
            mode: FileMode::from_metadata(metadata),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            is_dir: metadata.is_dir(),
            sys: SysInfo::from_metadata(metadata),
        }
    }

    pub fn is_regular(&self) -> bool {
        self.mode.is_regular()
    }

    pub fn permissions(&self) -> FileMode {
        self.mode.perm()
    }
}

/// メタデータキャッシュ
#[derive(Debug, Clone, Default)]
pub struct MetadataCache {
    info: Option<FileInfo>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&FileInfo> {
        self.info.as_ref()
    }

    pub fn is_cached(&self) -> bool {
        self.info.is_some()
    }

    /// キャッシュがあればそれを、無ければOSへ問い合わせて保存
    ///
    /// 失敗時はキャッシュを空のまま残すので、次の呼び出しで再試行される。
    pub fn stat<S: FileSystem>(&mut self, fs: &S, abs: &Path) -> Result<FileInfo> {
        if let Some(info) = &self.info {
            return Ok(info.clone());
        }

        let metadata = fs
            .metadata(abs)
            .map_err(|e| FileError::wrap("stat", abs, e))?;
        let info = FileInfo::from_metadata(abs, &metadata);
        log::trace!("cached metadata for {} ({} bytes)", abs.display(), info.size);
        self.info = Some(info.clone());
        Ok(info)
    }

    pub fn invalidate(&mut self) {
        self.info = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::file::fs::OsFileSystem;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_mode_display() {
        assert_eq!(FileMode::from_bits(0o100_644).to_string(), "-rw-r--r--");
        assert_eq!(FileMode::from_bits(0o040_755).to_string(), "drwxr-xr-x");
        assert_eq!(FileMode::default().to_string(), "----------");
    }

    #[test]
    fn test_mode_bits() {
        let mode = FileMode::from_bits(0o100_640);
        assert!(mode.is_regular());
        assert!(!mode.is_dir());
        assert_eq!(mode.perm(), FileMode::from_bits(0o640));
        assert_eq!(mode.file_type(), FileMode::from_bits(FileMode::REGULAR));
    }

    #[test]
    fn test_cache_keeps_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snap.txt");
        fs::write(&path, "12345").unwrap();

        let mut cache = MetadataCache::new();
        let info = cache.stat(&OsFileSystem, &path).unwrap();
        assert_eq!(info.size, 5);
        assert_eq!(info.name, "snap.txt");
        assert!(info.is_regular());

        // 外部変更は反映されない
        fs::write(&path, "1234567890").unwrap();
        assert_eq!(cache.stat(&OsFileSystem, &path).unwrap().size, 5);

        cache.invalidate();
        assert_eq!(cache.stat(&OsFileSystem, &path).unwrap().size, 10);
    }

    #[test]
    fn test_failed_stat_leaves_cache_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.txt");

        let mut cache = MetadataCache::new();
        let err = cache.stat(&OsFileSystem, &path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!cache.is_cached());

        fs::write(&path, "now here").unwrap();
        assert_eq!(cache.stat(&OsFileSystem, &path).unwrap().size, 8);
    }

    #[test]
    fn test_directory_info() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = MetadataCache::new();
        let info = cache.stat(&OsFileSystem, temp_dir.path()).unwrap();
        assert!(info.is_dir);
        assert!(info.mode.is_dir());
        assert!(!info.is_regular());
    }
}
