//! 청크와 청크 테이블 정의
//!
//! - Chunk: 파일의 고정 크기 조각, 시퀀스 ID는 원본 파일 내 바이트 오프셋
//! - ChunkTable: 전송 시작 시 한 번 만들어지는 불변 청크 목록

use std::path::Path;

use bytes::Bytes;

use crate::{Error, Result};

/// 시퀀스 ID (바이트 오프셋, 32비트 부호 있는 정수)
pub type SeqId = i32;

/// 청크 (송신 패킷 단위)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 원본 파일 내 첫 바이트 오프셋
    pub seq_id: SeqId,

    /// 실제 데이터
    pub data: Bytes,
}

/// 청크 테이블
///
/// 청크 `i`의 시퀀스 ID는 `i * message_size`.
/// 시퀀스 ID와 인덱스가 1:1 대응하므로 인덱스로 조회함.
#[derive(Debug, Clone)]
pub struct ChunkTable {
    chunks: Vec<Chunk>,
    message_size: usize,
    total_bytes: u64,
}

impl ChunkTable {
    /// 데이터를 청크들로 분할
    pub fn from_bytes(data: impl Into<Bytes>, message_size: usize) -> Result<Self> {
        if message_size == 0 {
            return Err(Error::InvalidConfig("message_size는 0일 수 없음".into()));
        }

        let data: Bytes = data.into();
        let total_bytes = data.len() as u64;

        // 종료 패킷 시퀀스(마지막 + message_size)까지 32비트 안에 들어와야 함
        let fin_offset = (data.len() as u64).div_ceil(message_size as u64) * message_size as u64;
        if fin_offset > SeqId::MAX as u64 {
            return Err(Error::SequenceOverflow { offset: fin_offset });
        }

        let chunks = (0..data.len())
            .step_by(message_size)
            .map(|offset| {
                let end = (offset + message_size).min(data.len());
                Chunk {
                    seq_id: offset as SeqId,
                    data: data.slice(offset..end),
                }
            })
            .collect();

        Ok(Self {
            chunks,
            message_size,
            total_bytes,
        })
    }

    /// 파일을 읽어 청크 테이블 생성
    pub fn from_file(path: impl AsRef<Path>, message_size: usize) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(data, message_size)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    /// 인덱스의 시퀀스 ID
    pub fn seq_id(&self, index: usize) -> SeqId {
        (index * self.message_size) as SeqId
    }

    pub fn message_size(&self) -> usize {
        self.message_size
    }

    /// 전체 페이로드 바이트 수
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// 종료 패킷 시퀀스 (마지막 청크 + message_size, 빈 테이블이면 0)
    pub fn fin_seq_id(&self) -> SeqId {
        match self.chunks.last() {
            Some(last) => last.seq_id + self.message_size as SeqId,
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_split_into_chunks() {
        let data: Vec<u8> = (0..250u8).collect();
        let table = ChunkTable::from_bytes(data.clone(), 100).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.total_bytes(), 250);

        let seq_ids: Vec<SeqId> = table.iter().map(|c| c.seq_id).collect();
        assert_eq!(seq_ids, vec![0, 100, 200]);
        assert_eq!(table.seq_id(2), 200);
        assert_eq!(table.get(2).unwrap().data.len(), 50);
        assert_eq!(table.fin_seq_id(), 300);

        let joined: Vec<u8> = table.iter().flat_map(|c| c.data.to_vec()).collect();
        assert_eq!(joined, data);
    }

    #[test]
    fn test_exact_multiple() {
        let table = ChunkTable::from_bytes(vec![1u8; 300], 100).unwrap();
        assert_eq!(table.len(), 3);
        assert!(table.iter().all(|c| c.data.len() == 100));
        assert_eq!(table.fin_seq_id(), 300);
    }

    #[test]
    fn test_empty_table() {
        let table = ChunkTable::from_bytes(Vec::<u8>::new(), 100).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.fin_seq_id(), 0);
        assert_eq!(table.total_bytes(), 0);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0xABu8; 2500]).unwrap();

        let table = ChunkTable::from_file(file.path(), 1020).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(1).unwrap().seq_id, 1020);
    }

    #[test]
    fn test_missing_file() {
        let err = ChunkTable::from_file("/nonexistent/arq/input.bin", 1020).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
