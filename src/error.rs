//! エラーハンドリングシステム
//!
//! OSレベルの失敗を「操作名」と「パス」で包む統一エラー型を定義する。
//! 呼び出し側はメッセージ文字列ではなく `ErrorKind` と `Sentinel` で分岐する。

use std::error::Error as StdError;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::logging::ErrorLogger;

/// 原因エラーの格納型
pub type Cause = Box<dyn StdError + Send + Sync + 'static>;

/// エラー種別（閉じた列挙）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    AlreadyExists,
    Closed,
    Invalid,
    Timeout,
    Io,
    /// 読み込みバイト数がキャッシュ済みサイズと一致しない
    Consistency,
    /// バッファ確保・解放の失敗
    OutOfMemory,
}

impl ErrorKind {
    /// `std::io::ErrorKind` からの変換
    pub fn from_io(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists,
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => ErrorKind::Invalid,
            io::ErrorKind::TimedOut => ErrorKind::Timeout,
            io::ErrorKind::OutOfMemory => ErrorKind::OutOfMemory,
            _ => ErrorKind::Io,
        }
    }

    fn classify(err: &(dyn StdError + 'static)) -> Self {
        if let Some(e) = err.downcast_ref::<FileError>() {
            return e.kind;
        }
        if let Some(e) = err.downcast_ref::<io::Error>() {
            return Self::from_io(e.kind());
        }
        if let Some(s) = err.downcast_ref::<Sentinel>() {
            return s.kind().unwrap_or(ErrorKind::Io);
        }
        ErrorKind::Io
    }
}

/// 公開センチネルエラー
///
/// ホスト側に対応する `io::ErrorKind` があるものはそれと同一視され、
/// `FileError::is` で原因チェーンを辿って照合される。
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sentinel {
    #[error("file does not exist")]
    NotFound,

    #[error("permission denied")]
    PermissionDenied,

    #[error("file already exists")]
    AlreadyExists,

    #[error("file already closed")]
    Closed,

    #[error("invalid argument")]
    Invalid,

    #[error("file type does not support deadline")]
    NoDeadline,

    #[error("i/o timeout")]
    DeadlineExceeded,

    #[error("process already finished")]
    ProcessDone,

    #[error("read/write on closed pipe")]
    ClosedPipe,

    #[error("multiple read calls return no data or error")]
    NoProgress,

    #[error("short buffer")]
    ShortBuffer,

    #[error("short write")]
    ShortWrite,

    #[error("unexpected EOF")]
    UnexpectedEof,

    #[error("syntax error in pattern")]
    BadPattern,
}

impl Sentinel {
    /// 対応する `ErrorKind`（種別比較で一致とみなすもの）
    pub fn kind(self) -> Option<ErrorKind> {
        match self {
            Sentinel::NotFound => Some(ErrorKind::NotFound),
            Sentinel::PermissionDenied => Some(ErrorKind::PermissionDenied),
            Sentinel::AlreadyExists => Some(ErrorKind::AlreadyExists),
            Sentinel::Closed => Some(ErrorKind::Closed),
            Sentinel::Invalid => Some(ErrorKind::Invalid),
            Sentinel::DeadlineExceeded => Some(ErrorKind::Timeout),
            _ => None,
        }
    }

    /// 対応するホストの `io::ErrorKind`
    pub fn io_kind(self) -> Option<io::ErrorKind> {
        match self {
            Sentinel::NotFound => Some(io::ErrorKind::NotFound),
            Sentinel::PermissionDenied => Some(io::ErrorKind::PermissionDenied),
            Sentinel::AlreadyExists => Some(io::ErrorKind::AlreadyExists),
            Sentinel::Invalid => Some(io::ErrorKind::InvalidInput),
            Sentinel::DeadlineExceeded => Some(io::ErrorKind::TimedOut),
            Sentinel::ClosedPipe => Some(io::ErrorKind::BrokenPipe),
            Sentinel::ShortWrite => Some(io::ErrorKind::WriteZero),
            Sentinel::UnexpectedEof => Some(io::ErrorKind::UnexpectedEof),
            _ => None,
        }
    }
}

/// 読み込みバイト数の不一致
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("bad read count: (want {expected} - got {actual})")]
pub struct ReadCountMismatch {
    pub expected: u64,
    pub actual: u64,
}

/// 操作名とパスを伴うファイルエラー
#[derive(Error, Debug)]
#[error("{} {}: {}", .op, .path.display(), .source)]
pub struct FileError {
    kind: ErrorKind,
    op: String,
    path: PathBuf,
    #[source]
    source: Cause,
}

impl FileError {
    /// 種別を明示して作成
    pub fn new(
        kind: ErrorKind,
        op: impl Into<String>,
        path: impl AsRef<Path>,
        cause: impl Into<Cause>,
    ) -> Self {
        Self {
            kind,
            op: op.into(),
            path: path.as_ref().to_path_buf(),
            source: cause.into(),
        }
    }

    /// 原因エラーから種別を推定して包む
    pub fn wrap(op: impl Into<String>, path: impl AsRef<Path>, cause: impl Into<Cause>) -> Self {
        let source = cause.into();
        let kind = ErrorKind::classify(&*source);
        Self {
            kind,
            op: op.into(),
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn closed(op: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self::new(ErrorKind::Closed, op, path, Sentinel::Closed)
    }

    pub fn already_exists(op: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self::new(ErrorKind::AlreadyExists, op, path, Sentinel::AlreadyExists)
    }

    pub fn invalid(op: impl Into<String>, path: impl AsRef<Path>, message: &str) -> Self {
        Self::new(ErrorKind::Invalid, op, path, message.to_string())
    }

    pub fn consistency(
        op: impl Into<String>,
        path: impl AsRef<Path>,
        expected: u64,
        actual: u64,
    ) -> Self {
        Self::new(
            ErrorKind::Consistency,
            op,
            path,
            ReadCountMismatch { expected, actual },
        )
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn op(&self) -> &str {
        &self.op
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 包まれた原因エラー（Unwrap相当）
    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.source
    }

    pub fn into_cause(self) -> Cause {
        self.source
    }

    /// 原因が `io::Error` であればその種別
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        self.source.downcast_ref::<io::Error>().map(io::Error::kind)
    }

    /// タイムアウトかどうか（原因へ委譲、判定できなければ false）
    pub fn timeout(&self) -> bool {
        if let Some(e) = self.source.downcast_ref::<FileError>() {
            return e.timeout();
        }
        if let Some(e) = self.source.downcast_ref::<io::Error>() {
            return e.kind() == io::ErrorKind::TimedOut;
        }
        matches!(
            self.source.downcast_ref::<Sentinel>(),
            Some(Sentinel::DeadlineExceeded)
        )
    }

    /// センチネルとの照合
    ///
    /// 種別が一致するか、原因チェーン上にセンチネル自身または
    /// 対応する `io::ErrorKind` を持つエラーがあれば true。
    pub fn is(&self, sentinel: Sentinel) -> bool {
        if sentinel.kind() == Some(self.kind) {
            return true;
        }
        matches_sentinel(&*self.source, sentinel)
    }
}

fn matches_sentinel(err: &(dyn StdError + 'static), sentinel: Sentinel) -> bool {
    if let Some(s) = err.downcast_ref::<Sentinel>() {
        return *s == sentinel;
    }
    if let Some(e) = err.downcast_ref::<FileError>() {
        return e.is(sentinel);
    }
    if let Some(e) = err.downcast_ref::<io::Error>() {
        if sentinel.io_kind() == Some(e.kind()) {
            return true;
        }
        // io::Error::source() は内側のエラー自身を飛ばすため get_ref で辿る
        return match e.get_ref() {
            Some(inner) => matches_sentinel(inner, sentinel),
            None => false,
        };
    }
    err.source()
        .map_or(false, |next| matches_sentinel(next, sentinel))
}

/// エラーを操作名とパスで包む（nil素通し）
///
/// `err` が `None` なら `None` を返す。
pub fn new_error<E>(op: &str, path: impl AsRef<Path>, err: Option<E>) -> Option<FileError>
where
    E: Into<Cause>,
{
    err.map(|e| FileError::wrap(op, path, e))
}

/// エラーコンテキスト付与のためのトレイト
///
/// 包んだエラーはロガーを経由してから返される。
pub trait ErrorContext<T> {
    fn with_op(self, op: &str, path: &Path, logger: &ErrorLogger) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<Cause>,
{
    fn with_op(self, op: &str, path: &Path, logger: &ErrorLogger) -> Result<T> {
        self.map_err(|e| logger.err(FileError::wrap(op, path, e)))
    }
}

/// プロジェクト標準のResult型
pub type Result<T> = std::result::Result<T, FileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_error_passes_none_through() {
        let none: Option<io::Error> = None;
        assert!(new_error("open", "a.txt", none).is_none());
    }

    #[test]
    fn wrapped_error_exposes_cause() {
        let cause = io::Error::new(io::ErrorKind::NotFound, "no such file");
        let err = new_error("open", "/tmp/a.txt", Some(cause)).unwrap();

        let inner = err.cause().downcast_ref::<io::Error>().unwrap();
        assert_eq!(inner.kind(), io::ErrorKind::NotFound);
        assert_eq!(inner.to_string(), "no such file");
        assert!(err.source().is_some());

        let message = err.to_string();
        assert!(message.contains("open"));
        assert!(message.contains("/tmp/a.txt"));
    }

    #[test]
    fn kind_is_classified_from_cause() {
        let err = FileError::wrap("stat", "x", io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert!(err.is(Sentinel::PermissionDenied));
        assert!(!err.is(Sentinel::NotFound));

        let nested = FileError::wrap("copy", "y", err);
        assert_eq!(nested.kind(), ErrorKind::PermissionDenied);
        assert!(nested.is(Sentinel::PermissionDenied));
    }

    #[test]
    fn sentinel_matches_through_io_error_chain() {
        let io_err = io::Error::new(io::ErrorKind::Other, Sentinel::ShortBuffer);
        let err = FileError::wrap("read", "z", io_err);
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.is(Sentinel::ShortBuffer));
        assert!(!err.is(Sentinel::ShortWrite));

        let eof = FileError::wrap("read", "z", io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(eof.is(Sentinel::UnexpectedEof));
    }

    #[test]
    fn timeout_delegates_to_cause() {
        let timed_out = FileError::wrap("read", "p", io::Error::from(io::ErrorKind::TimedOut));
        assert!(timed_out.timeout());
        assert!(timed_out.is(Sentinel::DeadlineExceeded));

        let not_timed_out = FileError::wrap("read", "p", "plain message");
        assert!(!not_timed_out.timeout());
        assert_eq!(not_timed_out.kind(), ErrorKind::Io);
    }

    #[test]
    fn consistency_error_reports_counts() {
        let err = FileError::consistency("read", "f", 10, 4);
        assert_eq!(err.kind(), ErrorKind::Consistency);
        let mismatch = err.cause().downcast_ref::<ReadCountMismatch>().unwrap();
        assert_eq!(mismatch.expected, 10);
        assert_eq!(mismatch.actual, 4);
    }
}
