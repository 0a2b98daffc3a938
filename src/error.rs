//! 에러 타입 정의

use thiserror::Error;

/// ARQ 전송 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("설정 파싱 에러: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("유효하지 않은 설정: {0}")]
    InvalidConfig(String),

    #[error("페이로드 크기 초과: {len} bytes (최대 {max})")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("시퀀스 오버플로우: 오프셋 {offset}은 32비트 범위를 벗어남")]
    SequenceOverflow { offset: u64 },

    #[error("수신 대기 타임아웃")]
    Timeout,
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
