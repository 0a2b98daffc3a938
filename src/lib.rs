//! # ARQ
//!
//! UDP 위에서 동작하는 신뢰성 전송 + 혼잡 제어 계층
//!
//! ## 핵심 특징
//! - **누적 ACK**: 수신측은 다음으로 기대하는 바이트 오프셋만 돌려줌
//! - **교체 가능한 전송 방식**: Stop-and-Wait / 고정 슬라이딩 윈도우 / TCP Reno
//! - **단일 타이머**: 가장 오래된 미확인 청크만 타임아웃 검사 (Go-Back-N 방식)
//! - **Reno 혼잡제어**: Slow Start, Congestion Avoidance, Fast Retransmit/Recovery
//! - **전송 지표**: 처리율, 평균 ACK 지연, 종합 성능 점수

pub mod chunk;
pub mod config;
pub mod congestion;
pub mod engine;
pub mod error;
pub mod message;
pub mod receiver;
pub mod sender;
pub mod stats;
pub mod timer;

pub use chunk::{Chunk, ChunkTable, SeqId};
pub use config::{Config, ConfigFile, PolicyKind};
pub use congestion::{CongestionPolicy, FixedWindow, Reno, StopAndWait};
pub use engine::{AckOutcome, SendEngine};
pub use error::{Error, Result};
pub use message::PacketCodec;
pub use receiver::{ReceivedFile, Receiver, ReceiverStats};
pub use sender::Sender;
pub use stats::{MetricsCollector, TransferMetrics, TransferReport, TransferStats};
pub use timer::RetransmissionTimer;

/// 시퀀스 헤더 크기 (바이트)
pub const SEQ_ID_SIZE: usize = 4;

/// 기본 패킷 크기 (헤더 포함, 바이트)
pub const DEFAULT_PACKET_SIZE: usize = 1024;

/// 기본 페이로드 크기 (바이트)
pub const DEFAULT_MESSAGE_SIZE: usize = DEFAULT_PACKET_SIZE - SEQ_ID_SIZE;

/// 종료 패킷 페이로드
pub const FIN_PAYLOAD: &[u8] = b"==FINACK==";
