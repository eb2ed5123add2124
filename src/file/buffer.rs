//! コンテンツバッファ
//!
//! ファイル内容のメモリ上の写し。読み込み済みかどうかは長さではなく
//! `LoadState` で判定するので、0バイトのファイルも「読み込み済み」になれる。

use std::collections::TryReserveError;
use std::io::{self, Read};

/// 容量を丸める単位
pub const CHUNK_SIZE: usize = 512;
/// 既定のバッファサイズ
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// `size` 以上で最小の `CHUNK_SIZE` の倍数
///
/// 倍数が `usize` に収まらない場合は `size` をそのまま返す。
pub fn chunk_multiple(size: usize) -> usize {
    size.div_ceil(CHUNK_SIZE)
        .checked_mul(CHUNK_SIZE)
        .unwrap_or(size)
}

/// 初期容量の見積もり
///
/// `DEFAULT_BUFFER_SIZE` 以下はその値、超える場合はチャンク倍数へ切り上げる。
pub fn initial_capacity(capacity: usize) -> usize {
    if capacity <= DEFAULT_BUFFER_SIZE {
        DEFAULT_BUFFER_SIZE
    } else {
        chunk_multiple(capacity)
    }
}

/// 読み込み状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// 一度も読み込んでいない
    #[default]
    NotLoaded,
    /// ディスクから読み込んだ、または `replace` で設定済み
    Loaded,
    /// 破棄済み（次回アクセスで再読み込み）
    Invalidated,
}

#[derive(Debug, Default)]
pub struct ContentBuffer {
    bytes: Vec<u8>,
    state: LoadState,
}

impl ContentBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.state == LoadState::Loaded
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// 呼び出し側が内部状態を変更できないようにコピーを返す
    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    /// リーダーの終端までを読み込み、読み込み済みにする
    ///
    /// 失敗時は以前の内容を保持したまま状態も変えない。
    pub fn fill<R: Read>(&mut self, reader: &mut R, size_hint: usize) -> io::Result<usize> {
        let mut fresh = Vec::new();
        fresh
            .try_reserve(initial_capacity(size_hint))
            .map_err(|e| io::Error::new(io::ErrorKind::OutOfMemory, e))?;
        let read = reader.read_to_end(&mut fresh)?;
        self.bytes = fresh;
        self.state = LoadState::Loaded;
        Ok(read)
    }

    /// 内容を丸ごと置き換える（ディスクへは書かない）
    pub fn replace(&mut self, data: &[u8]) -> Result<usize, TryReserveError> {
        let mut fresh = Vec::new();
        fresh.try_reserve_exact(data.len())?;
        fresh.extend_from_slice(data);
        self.bytes = fresh;
        self.state = LoadState::Loaded;
        Ok(data.len())
    }

    /// 内容を捨てて未読み込みに戻す
    pub fn reset(&mut self) {
        self.bytes = Vec::new();
        self.state = LoadState::NotLoaded;
    }

    /// 内容と確保領域を解放する
    ///
    /// 長さと容量が共に0になったかを返す。
    pub fn purge(&mut self) -> bool {
        self.bytes = Vec::new();
        self.state = LoadState::Invalidated;
        self.bytes.is_empty() && self.bytes.capacity() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_chunk_multiple() {
        let cases = [
            (550, 1024),
            (1200, 1536),
            (100, 512),
            (5234, 5632),
            (42000, 42496),
            (512, 512),
            (0, 0),
        ];
        for (size, expected) in cases {
            assert_eq!(chunk_multiple(size), expected, "size {}", size);
        }
    }

    #[test]
    fn test_initial_capacity() {
        assert_eq!(initial_capacity(16), 4096);
        assert_eq!(initial_capacity(4096), 4096);
        assert_eq!(initial_capacity(5333), 5632);
    }

    #[test]
    fn test_chunk_multiple_near_usize_max() {
        assert_eq!(chunk_multiple(usize::MAX), usize::MAX);
        assert_eq!(chunk_multiple(usize::MAX - 100), usize::MAX - 100);
        assert_eq!(initial_capacity(usize::MAX), usize::MAX);
    }

    #[test]
    fn test_fill_reports_oversized_hint_as_out_of_memory() {
        let mut buffer = ContentBuffer::new();
        buffer.replace(b"kept").unwrap();

        let err = buffer
            .fill(&mut Cursor::new(b"ignored".to_vec()), usize::MAX)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::OutOfMemory);
        assert_eq!(buffer.as_slice(), b"kept");
    }

    #[test]
    fn test_fill_marks_loaded_even_when_empty() {
        let mut buffer = ContentBuffer::new();
        assert_eq!(buffer.state(), LoadState::NotLoaded);

        let read = buffer.fill(&mut Cursor::new(Vec::<u8>::new()), 0).unwrap();
        assert_eq!(read, 0);
        assert!(buffer.is_loaded());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_replace_and_purge() {
        let mut buffer = ContentBuffer::new();
        assert_eq!(buffer.replace(b"hello").unwrap(), 5);
        assert_eq!(buffer.as_slice(), b"hello");

        let mut copy = buffer.snapshot();
        copy[0] = b'j';
        assert_eq!(buffer.as_slice(), b"hello");

        assert!(buffer.purge());
        assert_eq!(buffer.len(), 0);
        assert_eq!(buffer.capacity(), 0);
        assert_eq!(buffer.state(), LoadState::Invalidated);
    }
}
