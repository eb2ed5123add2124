//! パス解決
//!
//! 利用者が渡した名前を絶対パスへ解決し、初回解決後はキャッシュする。

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::error::{FileError, Result};
use crate::file::fs::FileSystem;

/// バックアップファイルの接尾辞
pub const BACKUP_SUFFIX: &str = ".bak";
/// 一時ファイルの接尾辞
pub const TEMP_SUFFIX: &str = "~";

/// 字句的なパス正規化
///
/// `.` を除去し `..` を直前の要素と相殺する。ルートより上への `..` は捨て、
/// 相対パス先頭の `..` は残す。ファイルシステムには触れない。
pub fn clean(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => continue,
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => components.push(component),
            },
            other => components.push(other),
        }
    }

    if components.is_empty() {
        return PathBuf::from(".");
    }
    components.iter().collect()
}

/// `~` と環境変数を展開
pub fn expand(path: &Path) -> std::result::Result<PathBuf, String> {
    let raw = path.to_string_lossy();
    shellexpand::full(&raw)
        .map(|expanded| PathBuf::from(expanded.as_ref()))
        .map_err(|e| e.to_string())
}

/// 名前を絶対パスへ解決
///
/// 相対パスのときだけカレントディレクトリを問い合わせる。
pub fn resolve_absolute<S: FileSystem>(fs: &S, name: &Path, expand_home: bool) -> Result<PathBuf> {
    if name.as_os_str().is_empty() {
        return Err(FileError::invalid("abs", name, "empty file name"));
    }

    let name = if expand_home {
        expand(name).map_err(|message| FileError::invalid("abs", name, &message))?
    } else {
        name.to_path_buf()
    };

    if name.is_absolute() {
        return Ok(clean(&name));
    }

    let cwd = fs
        .current_dir()
        .map_err(|e| FileError::wrap("abs", &name, e))?;
    Ok(clean(&cwd.join(name)))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_os_string();
    raw.push(suffix);
    PathBuf::from(raw)
}

/// `<abs>.bak`
pub fn backup_path(abs: &Path) -> PathBuf {
    with_suffix(abs, BACKUP_SUFFIX)
}

/// `<abs>~`
pub fn temp_path(abs: &Path) -> PathBuf {
    with_suffix(abs, TEMP_SUFFIX)
}

/// パスの末尾要素（ファイル名）
pub fn base_name(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => path.to_string_lossy().into_owned(),
    }
}

/// 絶対パスのキャッシュ
///
/// `provided` は構築時の名前のまま変わらない。`current` は移動・改名で
/// 新しい場所へ更新され、キャッシュはその都度捨てられる。
#[derive(Debug, Clone)]
pub struct PathResolver {
    provided: PathBuf,
    current: PathBuf,
    abs: Option<PathBuf>,
    expand_home: bool,
}

impl PathResolver {
    pub fn new(name: PathBuf, expand_home: bool) -> Self {
        Self {
            current: name.clone(),
            provided: name,
            abs: None,
            expand_home,
        }
    }

    pub fn provided_name(&self) -> &Path {
        &self.provided
    }

    pub fn current_name(&self) -> &Path {
        &self.current
    }

    pub fn cached(&self) -> Option<&Path> {
        self.abs.as_deref()
    }

    /// キャッシュ済みの絶対パス、無ければ解決して保存
    pub fn resolve<S: FileSystem>(&mut self, fs: &S) -> Result<&Path> {
        let abs = match self.abs.take() {
            Some(abs) => abs,
            None => {
                let abs = resolve_absolute(fs, &self.current, self.expand_home)?;
                log::trace!("resolved {} -> {}", self.current.display(), abs.display());
                abs
            }
        };
        Ok(self.abs.insert(abs).as_path())
    }

    /// 新しい場所を記録してキャッシュを捨てる
    pub fn relocate(&mut self, destination: PathBuf) {
        self.current = destination;
        self.abs = None;
    }

    pub fn clear(&mut self) {
        self.abs = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::fs::OsFileSystem;

    #[test]
    fn test_clean() {
        assert_eq!(clean(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(clean(Path::new("/../x")), PathBuf::from("/x"));
        assert_eq!(clean(Path::new("a/../../b")), PathBuf::from("../b"));
        assert_eq!(clean(Path::new("./")), PathBuf::from("."));
    }

    #[test]
    fn test_companion_names() {
        let abs = Path::new("/data/report.txt");
        assert_eq!(backup_path(abs), PathBuf::from("/data/report.txt.bak"));
        assert_eq!(temp_path(abs), PathBuf::from("/data/report.txt~"));
        assert_eq!(base_name(abs), "report.txt");
    }

    #[test]
    fn test_resolve_relative_against_cwd() {
        let cwd = std::env::current_dir().unwrap();
        let abs = resolve_absolute(&OsFileSystem, Path::new("x/./y.txt"), false).unwrap();
        assert_eq!(abs, cwd.join("x").join("y.txt"));
    }

    #[test]
    fn test_resolve_rejects_empty_name() {
        let err = resolve_absolute(&OsFileSystem, Path::new(""), false).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Invalid);
    }

    #[test]
    fn test_resolver_relocate_clears_cache() {
        let mut resolver = PathResolver::new(PathBuf::from("/tmp/a.txt"), false);
        assert!(resolver.cached().is_none());
        assert_eq!(
            resolver.resolve(&OsFileSystem).unwrap(),
            Path::new("/tmp/a.txt")
        );
        assert!(resolver.cached().is_some());

        resolver.relocate(PathBuf::from("/tmp/b.txt"));
        assert!(resolver.cached().is_none());
        assert_eq!(resolver.provided_name(), Path::new("/tmp/a.txt"));
        assert_eq!(
            resolver.resolve(&OsFileSystem).unwrap(),
            Path::new("/tmp/b.txt")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_expand_env() {
        std::env::set_var("BASICFILE_TEST_DIR", "/srv/files");
        let abs = resolve_absolute(&OsFileSystem, Path::new("$BASICFILE_TEST_DIR/a"), true).unwrap();
        assert_eq!(abs, PathBuf::from("/srv/files/a"));
    }
}
