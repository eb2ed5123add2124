//! UTF-8 テキストとしての表示
//!
//! 内容バッファをそのまま使うので、読み書きのタイミングは `BasicFile` と同じ。

use std::path::PathBuf;

use crate::error::{ErrorKind, FileError, Result};
use crate::file::basic::BasicFile;
use crate::file::fs::{FileSystem, OsFileSystem};

/// 既定の行区切り
pub const DEFAULT_SEPARATOR: u8 = b'\n';

#[derive(Debug)]
pub struct TextFile<S: FileSystem = OsFileSystem> {
    file: BasicFile<S>,
    separator: u8,
}

impl TextFile<OsFileSystem> {
    pub fn new(name: impl Into<PathBuf>) -> Self {
        Self::from_file(BasicFile::new(name))
    }
}

impl<S: FileSystem> TextFile<S> {
    pub fn from_file(file: BasicFile<S>) -> Self {
        Self {
            file,
            separator: DEFAULT_SEPARATOR,
        }
    }

    pub fn file(&self) -> &BasicFile<S> {
        &self.file
    }

    pub fn file_mut(&mut self) -> &mut BasicFile<S> {
        &mut self.file
    }

    pub fn into_inner(self) -> BasicFile<S> {
        self.file
    }

    pub fn separator(&self) -> u8 {
        self.separator
    }

    /// 行区切りを変更する（ASCII のみ、それ以外は `Invalid`）
    pub fn set_separator(&mut self, separator: u8) -> Result<()> {
        if !separator.is_ascii() {
            return Err(self.file.logger().err(FileError::invalid(
                "set_separator",
                self.file.provided_name(),
                "separator must be an ASCII byte",
            )));
        }
        self.separator = separator;
        Ok(())
    }

    /// 内容全体を文字列として取得（不正なUTF-8は `Invalid`）
    pub fn text(&mut self) -> Result<String> {
        let data = self.file.data()?;
        String::from_utf8(data).map_err(|e| {
            let path = self.file.abs();
            self.file
                .logger()
                .err(FileError::new(ErrorKind::Invalid, "text", path, e))
        })
    }

    /// 区切り文字で分割した行
    ///
    /// 末尾の区切りの後ろは空行として数えない。区切りが `\n` の場合は
    /// 行末の `\r` も取り除く。
    pub fn lines(&mut self) -> Result<Vec<String>> {
        let text = self.text()?;
        let separator = char::from(self.separator);

        let mut lines: Vec<String> = text
            .split(separator)
            .map(|line| {
                if separator == '\n' {
                    line.strip_suffix('\r').unwrap_or(line).to_string()
                } else {
                    line.to_string()
                }
            })
            .collect();
        if text.is_empty() || text.ends_with(separator) {
            lines.pop();
        }
        Ok(lines)
    }

    /// 内容を置き換える（ディスクへは `sync` で書き出す）
    pub fn set_text(&mut self, text: &str) -> Result<usize> {
        self.file.set_data(text.as_bytes())
    }
}
