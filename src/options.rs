//! ファイル操作の設定
//!
//! 既定値・環境変数による上書き・ロガー構築をまとめる。

use std::path::PathBuf;

use crate::logging::{ErrorLogger, LogLevel};

/// デバッグログを有効にする環境変数
pub const DEBUG_ENV: &str = "BASICFILE_DEBUG";
/// ログファイルの出力先を指定する環境変数
pub const LOG_PATH_ENV: &str = "BASICFILE_LOG";

/// ロード時にファイルサイズへ上乗せする最小バッファ量
pub const DEFAULT_MIN_BUFFER_SIZE: usize = 64;

/// ファイルハンドルの動作オプション
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOptions {
    /// 初回オープン時にファイルが無ければ作成する
    pub create_if_missing: bool,
    /// 読み書きオープンが権限不足で失敗したら読み取り専用で開き直す
    pub read_only_fallback: bool,
    /// `~` と `$VAR` をパス解決前に展開する
    pub expand_home: bool,
    /// `sync()` の前にディスク上の内容を `.bak` へ退避する
    pub backup_on_sync: bool,
    pub min_buffer_size: usize,
    /// OSエラーをロガーへ流す
    pub log_errors: bool,
    pub log_level: LogLevel,
    /// ログファイルへ出力する（未指定時は既定の場所）
    pub log_to_file: bool,
    pub log_path: Option<PathBuf>,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            read_only_fallback: true,
            expand_home: false,
            backup_on_sync: false,
            min_buffer_size: DEFAULT_MIN_BUFFER_SIZE,
            log_errors: false,
            log_level: LogLevel::Error,
            log_to_file: false,
            log_path: None,
        }
    }
}

impl FileOptions {
    /// 環境変数を反映した設定
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var(DEBUG_ENV).ok(),
            std::env::var(LOG_PATH_ENV).ok(),
        )
    }

    fn from_vars(debug: Option<String>, log_path: Option<String>) -> Self {
        let mut options = Self::default();

        if let Some(value) = debug {
            options.log_errors = true;
            options.log_level = LogLevel::parse(&value).unwrap_or(LogLevel::Debug);
        }

        if let Some(path) = log_path.filter(|p| !p.trim().is_empty()) {
            options.log_errors = true;
            options.log_to_file = true;
            options.log_path = Some(PathBuf::from(path));
        }

        options
    }

    pub fn with_create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    pub fn with_read_only_fallback(mut self, fallback: bool) -> Self {
        self.read_only_fallback = fallback;
        self
    }

    pub fn with_expand_home(mut self, expand: bool) -> Self {
        self.expand_home = expand;
        self
    }

    pub fn with_backup_on_sync(mut self, backup: bool) -> Self {
        self.backup_on_sync = backup;
        self
    }

    pub fn with_min_buffer_size(mut self, size: usize) -> Self {
        self.min_buffer_size = size;
        self
    }

    /// エラーログを有効化
    pub fn with_logging(mut self, level: LogLevel) -> Self {
        self.log_errors = true;
        self.log_level = level;
        self
    }

    /// ログファイル出力を設定
    pub fn with_log_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.log_errors = true;
        self.log_to_file = true;
        self.log_path = Some(path.into());
        self
    }

    pub fn resolve_log_path(&self) -> Option<PathBuf> {
        match &self.log_path {
            Some(path) => Some(path.clone()),
            None => default_log_path(),
        }
    }

    /// 設定に応じたロガーを構築
    pub fn logger(&self) -> ErrorLogger {
        if !self.log_errors {
            return ErrorLogger::disabled();
        }

        let logger = ErrorLogger::new(self.log_level);
        if !self.log_to_file {
            return logger;
        }

        match self.resolve_log_path() {
            Some(path) => logger.with_file_output(path),
            None => {
                log::warn!("no log file location available, logging through the log facade");
                logger
            }
        }
    }
}

fn default_log_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|cache| cache.join("basicfile").join("error.log"))
}
