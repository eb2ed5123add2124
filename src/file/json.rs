//! JSONファイル
//!
//! 内容バッファを `serde_json` で読み書きする。存在しない・空のファイルは
//! `T::default()` として読み込む。

use std::marker::PhantomData;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ErrorKind, FileError, Result};
use crate::file::basic::BasicFile;
use crate::file::fs::{FileSystem, OsFileSystem};

#[derive(Debug)]
pub struct JsonFile<T, S: FileSystem = OsFileSystem> {
    file: BasicFile<S>,
    pretty: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFile<T, OsFileSystem>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(name: impl Into<PathBuf>) -> Self {
        Self::from_file(BasicFile::new(name))
    }
}

impl<T, S> JsonFile<T, S>
where
    T: Serialize + DeserializeOwned + Default,
    S: FileSystem,
{
    pub fn from_file(file: BasicFile<S>) -> Self {
        Self {
            file,
            pretty: true,
            _marker: PhantomData,
        }
    }

    /// 整形出力の切り替え（既定は整形あり）
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
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

    pub fn load(&mut self) -> Result<T> {
        let data = match self.file.data() {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(e),
        };
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(T::default());
        }

        serde_json::from_slice(&data).map_err(|e| {
            let path = self.file.abs();
            self.file
                .logger()
                .err(FileError::new(ErrorKind::Invalid, "load", path, e))
        })
    }

    /// シリアライズしてディスクへ書き出す
    pub fn save(&mut self, value: &T) -> Result<()> {
        let encoded = if self.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        };
        let data = encoded.map_err(|e| {
            let path = self.file.abs();
            self.file
                .logger()
                .err(FileError::new(ErrorKind::Invalid, "save", path, e))
        })?;

        self.file.set_data(&data)?;
        self.file.sync()
    }
}
