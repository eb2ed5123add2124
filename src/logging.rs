//! ロギングシステム
//!
//! エラー値を注入可能なログ関数へ流す `ErrorLogger` を提供する。
//! 既定の出力先は `log` クレートのファサード。

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::FileError;

/// ログ関数（可変個のログ可能な値を受け取り、何も返さない）
pub type LogFn = Arc<dyn Fn(&[&dyn fmt::Display]) + Send + Sync>;

/// ログレベル
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn tag(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }

    /// `log` クレートのレベルへ変換
    pub fn to_log_level(self) -> log::Level {
        match self {
            LogLevel::Trace => log::Level::Trace,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warning => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }

    /// 文字列からの解析（大文字小文字は区別しない）
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// 出力先
///
/// レベルは出力時に `ErrorLogger` から読むので、`with_level` の順序に依存しない。
#[derive(Clone)]
enum Sink {
    Discard,
    Facade,
    File(Arc<PathBuf>),
    Custom(LogFn),
}

/// エラーロガー
///
/// * クローンは有効フラグと出力先を共有する（`disable()` は全保持者に効く）
/// * 無効時の `err()` はフラグ読み出し1回のみで、値を変えずに返す
#[derive(Clone)]
pub struct ErrorLogger {
    enabled: Arc<AtomicBool>,
    level: LogLevel,
    sink: Sink,
}

impl ErrorLogger {
    /// `log` クレートへ出力する有効なロガー
    pub fn new(level: LogLevel) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(true)),
            level,
            sink: Sink::Facade,
        }
    }

    /// 何もしないロガー
    pub fn disabled() -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(false)),
            level: LogLevel::Error,
            sink: Sink::Discard,
        }
    }

    /// ログ関数を差し替え
    pub fn with_log_fn<F>(mut self, log_fn: F) -> Self
    where
        F: Fn(&[&dyn fmt::Display]) + Send + Sync + 'static,
    {
        self.sink = Sink::Custom(Arc::new(log_fn));
        self
    }

    /// ファイルへの追記出力を設定
    ///
    /// 各行の先頭には記録時点のレベル名が付く。
    pub fn with_file_output<P: Into<PathBuf>>(mut self, path: P) -> Self {
        let path = path.into();
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        self.sink = Sink::File(Arc::new(path));
        self
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// エラーを記録し、そのまま返す
    pub fn err(&self, err: FileError) -> FileError {
        if self.is_enabled() {
            self.emit(&[&err]);
        }
        err
    }

    /// 任意の値を記録
    pub fn log(&self, args: &[&dyn fmt::Display]) {
        if self.is_enabled() {
            self.emit(args);
        }
    }

    fn emit(&self, args: &[&dyn fmt::Display]) {
        match &self.sink {
            Sink::Discard => {}
            Sink::Facade => {
                log::log!(self.level.to_log_level(), "{}", join_args(args));
            }
            Sink::File(path) => {
                if let Ok(mut file) = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path.as_path())
                {
                    let _ = writeln!(file, "{}: {}", self.level.tag(), join_args(args));
                }
            }
            Sink::Custom(log_fn) => log_fn(args),
        }
    }
}

impl Default for ErrorLogger {
    fn default() -> Self {
        Self::disabled()
    }
}

impl fmt::Debug for ErrorLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorLogger")
            .field("enabled", &self.is_enabled())
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}

fn join_args(args: &[&dyn fmt::Display]) -> String {
    args.iter()
        .map(|arg| arg.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
