//! 수신자 (참조 구현)
//!
//! - 데이터 패킷의 4바이트 헤더 제거 후 순서대로 조립
//! - 순서가 어긋난 패킷은 버퍼링, 빈 구간이 채워지면 한꺼번에 반영
//! - 매 데이터 패킷마다 "다음 기대 오프셋" 누적 ACK 응답
//! - 종료 패킷 수신 시 세션 종료
//! - 선택적으로 수신 손실을 흉내냄 (테스트/실험용)

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::chunk::SeqId;
use crate::message::PacketCodec;
use crate::{Error, Result, DEFAULT_PACKET_SIZE};

/// 순서 어긋난 패킷 최대 버퍼링 개수 기본값
pub const DEFAULT_MAX_PENDING: usize = 4096;

/// 수신 통계
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// 처리한 데이터 패킷 수
    pub packets_received: u64,

    /// 이미 받은 구간의 패킷 수
    pub duplicate_packets: u64,

    /// 버퍼링된 순서 어긋난 패킷 수
    pub out_of_order_packets: u64,

    /// 손실 시뮬레이션으로 버린 패킷 수
    pub dropped_packets: u64,

    /// 버퍼가 가득 차 버린 순서 어긋난 패킷 수
    pub overflow_packets: u64,

    /// 송신한 ACK 수
    pub acks_sent: u64,
}

/// 수신 완료된 파일
#[derive(Debug, Clone)]
pub struct ReceivedFile {
    /// 조립된 데이터
    pub data: Bytes,

    /// 종료 패킷의 시퀀스
    pub fin_seq: SeqId,

    /// 수신 통계
    pub stats: ReceiverStats,
}

/// 누적 ACK 수신자
pub struct Receiver {
    socket: UdpSocket,
    packet_size: usize,
    loss_rate: f64,
    rng: StdRng,
    idle_timeout: Option<Duration>,
    max_pending: usize,
}

impl Receiver {
    /// 소켓 바인딩
    pub async fn bind(bind_addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(bind_addr).await?;
        info!("Receiver listening on {}", socket.local_addr()?);

        Ok(Self {
            socket,
            packet_size: DEFAULT_PACKET_SIZE,
            loss_rate: 0.0,
            rng: StdRng::from_entropy(),
            idle_timeout: None,
            max_pending: DEFAULT_MAX_PENDING,
        })
    }

    /// 최대 패킷 크기 (헤더 포함)
    pub fn with_packet_size(mut self, packet_size: usize) -> Self {
        self.packet_size = packet_size;
        self
    }

    /// 데이터 패킷 손실 시뮬레이션 (0.0 ~ 1.0), 종료 패킷은 버리지 않음
    pub fn with_loss(mut self, loss_rate: f64, seed: u64) -> Self {
        self.loss_rate = loss_rate.clamp(0.0, 1.0);
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// 이 시간 동안 아무 패킷도 없으면 [`Error::Timeout`]
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = Some(idle_timeout);
        self
    }

    /// 순서 어긋난 패킷 버퍼 상한 (초과분은 ACK만 보내고 버림)
    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// 종료 패킷을 받을 때까지 수신
    pub async fn receive(mut self) -> Result<ReceivedFile> {
        // 헤더 없는 데이터그램도 읽을 수 있도록 여유를 둠
        let mut buf = vec![0u8; self.packet_size.max(DEFAULT_PACKET_SIZE) + 64];
        let mut data = BytesMut::new();
        let mut pending: BTreeMap<SeqId, Bytes> = BTreeMap::new();
        let mut expected: SeqId = 0;
        let mut stats = ReceiverStats::default();

        loop {
            let (len, peer) = self.recv(&mut buf).await?;

            let Some((seq_id, payload)) = PacketCodec::decode_data(&buf[..len]) else {
                continue;
            };

            if PacketCodec::is_fin(&payload) && seq_id >= expected {
                info!("종료 패킷 수신: seq={}, {} bytes 조립", seq_id, data.len());
                return Ok(ReceivedFile {
                    data: data.freeze(),
                    fin_seq: seq_id,
                    stats,
                });
            }

            if self.loss_rate > 0.0 && self.rng.gen_bool(self.loss_rate) {
                stats.dropped_packets += 1;
                continue;
            }
            stats.packets_received += 1;

            if seq_id == expected {
                expected += payload.len() as SeqId;
                data.extend_from_slice(&payload);

                while let Some(next) = pending.remove(&expected) {
                    expected += next.len() as SeqId;
                    data.extend_from_slice(&next);
                }
            } else if seq_id > expected {
                if pending.contains_key(&seq_id) {
                    stats.duplicate_packets += 1;
                } else if pending.len() < self.max_pending {
                    pending.insert(seq_id, payload);
                    stats.out_of_order_packets += 1;
                } else {
                    stats.overflow_packets += 1;
                }
            } else {
                stats.duplicate_packets += 1;
            }

            match self
                .socket
                .send_to(&PacketCodec::encode_ack(expected), peer)
                .await
            {
                Ok(_) => stats.acks_sent += 1,
                Err(e) => warn!("ACK 송신 실패: {}", e),
            }
            debug!("ACK 전송: seq={} -> expected={}", seq_id, expected);
        }
    }

    async fn recv(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        match self.idle_timeout {
            Some(idle) => tokio::time::timeout(idle, self.socket.recv_from(buf))
                .await
                .map_err(|_| Error::Timeout)?
                .map_err(Error::from),
            None => Ok(self.socket.recv_from(buf).await?),
        }
    }
}
