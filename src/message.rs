//! 와이어 포맷 정의
//!
//! - 데이터 패킷: 4바이트 빅엔디안 부호 있는 시퀀스 + 페이로드
//! - ACK 패킷: 4바이트 빅엔디안 부호 있는 "다음 기대 오프셋", 페이로드 없음
//! - 종료 패킷: 마지막 시퀀스 + MESSAGE_SIZE, 페이로드는 고정 문자열

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::chunk::SeqId;
use crate::{Error, Result, FIN_PAYLOAD, SEQ_ID_SIZE};

/// 패킷 인코더/디코더
#[derive(Debug, Clone, Copy)]
pub struct PacketCodec {
    /// 최대 페이로드 크기
    message_size: usize,
}

impl PacketCodec {
    pub fn new(message_size: usize) -> Self {
        Self { message_size }
    }

    pub fn message_size(&self) -> usize {
        self.message_size
    }

    /// 데이터 패킷 인코딩
    pub fn encode(&self, seq_id: SeqId, payload: &[u8]) -> Result<Bytes> {
        if payload.len() > self.message_size {
            return Err(Error::PayloadTooLarge {
                len: payload.len(),
                max: self.message_size,
            });
        }

        let mut buf = BytesMut::with_capacity(SEQ_ID_SIZE + payload.len());
        buf.put_i32(seq_id);
        buf.put_slice(payload);
        Ok(buf.freeze())
    }

    /// 종료 패킷 인코딩
    ///
    /// 종료 페이로드는 크기 제한 검사 대상이 아님
    pub fn fin_packet(&self, seq_id: SeqId) -> Bytes {
        let mut buf = BytesMut::with_capacity(SEQ_ID_SIZE + FIN_PAYLOAD.len());
        buf.put_i32(seq_id);
        buf.put_slice(FIN_PAYLOAD);
        buf.freeze()
    }

    /// ACK 패킷 인코딩
    pub fn encode_ack(next_expected: SeqId) -> Bytes {
        Bytes::copy_from_slice(&next_expected.to_be_bytes())
    }

    /// ACK 패킷 디코딩 (헤더보다 짧으면 None, 나머지 바이트는 무시)
    pub fn decode_ack(bytes: &[u8]) -> Option<SeqId> {
        if bytes.len() < SEQ_ID_SIZE {
            return None;
        }
        let mut header = &bytes[..SEQ_ID_SIZE];
        Some(header.get_i32())
    }

    /// 데이터 패킷 디코딩
    pub fn decode_data(bytes: &[u8]) -> Option<(SeqId, Bytes)> {
        let seq_id = Self::decode_ack(bytes)?;
        Some((seq_id, Bytes::copy_from_slice(&bytes[SEQ_ID_SIZE..])))
    }

    /// 종료 페이로드 여부
    pub fn is_fin(payload: &[u8]) -> bool {
        payload == FIN_PAYLOAD
    }
}
