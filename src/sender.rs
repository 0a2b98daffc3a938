//! 송신자
//!
//! - 윈도우 채우기 → ACK 드레인 → 타임아웃 검사 반복
//! - 모든 청크 확인 후 종료 패킷 반복 전송 (응답 없음)
//! - 단일 태스크 협력적 루프, 대기는 짧은 ACK 폴링에서만 발생

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Instant;

use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::chunk::ChunkTable;
use crate::engine::{AckOutcome, SendEngine};
use crate::message::PacketCodec;
use crate::stats::{MetricsCollector, TransferReport};
use crate::{Config, Result, SEQ_ID_SIZE};

/// 송신자
pub struct Sender {
    /// 설정
    config: Config,

    /// 수신자에 connect된 소켓 (송신자 전용)
    socket: UdpSocket,

    /// 패킷 코덱
    codec: PacketCodec,

    /// 송신 상태 머신
    engine: SendEngine,
}

impl Sender {
    /// 수신자에 연결된 소켓으로 송신자 생성
    pub fn new(config: Config, socket: UdpSocket, table: ChunkTable) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            codec: PacketCodec::new(config.message_size()),
            engine: SendEngine::from_config(table, &config),
            config,
            socket,
        })
    }

    /// 소켓 바인딩 + 수신자 연결
    pub async fn connect(
        config: Config,
        bind_addr: SocketAddr,
        receiver_addr: SocketAddr,
        table: ChunkTable,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(receiver_addr).await?;
        Self::new(config, socket, table)
    }

    /// 파일을 읽어 송신자 생성
    pub async fn from_file(
        config: Config,
        bind_addr: SocketAddr,
        receiver_addr: SocketAddr,
        path: impl AsRef<Path>,
    ) -> Result<Self> {
        let table = ChunkTable::from_file(path, config.message_size())?;
        Self::connect(config, bind_addr, receiver_addr, table).await
    }

    pub fn engine(&self) -> &SendEngine {
        &self.engine
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// 전체 전송 실행
    pub async fn run(mut self) -> Result<TransferReport> {
        let total_bytes = self.engine.table().total_bytes();
        info!(
            "전송 시작: policy={}, {} bytes, {} chunks",
            self.engine.policy().name(),
            total_bytes,
            self.engine.total_chunks()
        );

        let mut collector = MetricsCollector::start(total_bytes);
        let mut buf = vec![0u8; self.config.packet_size.max(SEQ_ID_SIZE)];

        while !self.engine.is_complete() {
            self.fill_window().await;
            self.drain_acks(&mut buf).await;
            self.check_timeout().await;
        }

        collector.finish(Instant::now());
        let elapsed = collector.elapsed();

        self.terminate().await;

        let metrics = self.engine.metrics(&collector);
        let stats = self.engine.stats().clone();
        info!(
            "전송 완료: {:.3}s, {}",
            elapsed.as_secs_f64(),
            stats.summary()
        );

        Ok(TransferReport {
            policy: self.config.policy,
            total_bytes,
            elapsed,
            metrics,
            stats,
        })
    }

    /// 윈도우가 허용하는 만큼 새 청크 전송
    async fn fill_window(&mut self) {
        while let Some(index) = self.engine.next_transmission(Instant::now()) {
            self.transmit(index).await;
        }
    }

    /// 짧게 대기 후 이미 도착한 ACK를 모두 처리
    async fn drain_acks(&mut self, buf: &mut [u8]) {
        let poll = self.config.poll_interval();

        match tokio::time::timeout(poll, self.socket.recv(buf)).await {
            Ok(Ok(len)) => self.handle_ack(&buf[..len]).await,
            Ok(Err(e)) => {
                // 수신자가 아직 없으면 ConnectionRefused가 올 수 있음
                debug!("ACK 수신 에러: {}", e);
                tokio::time::sleep(poll).await;
                return;
            }
            Err(_) => {
                // 타임아웃, 계속
                return;
            }
        }

        loop {
            match self.socket.try_recv(buf) {
                Ok(len) => self.handle_ack(&buf[..len]).await,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    debug!("ACK 수신 에러: {}", e);
                    break;
                }
            }
        }
    }

    async fn handle_ack(&mut self, datagram: &[u8]) {
        if let Some(AckOutcome::Duplicate {
            retransmit: Some(index),
        }) = self.engine.on_ack_datagram(datagram, Instant::now())
        {
            self.transmit(index).await;
        }
    }

    async fn check_timeout(&mut self) {
        if let Some(index) = self.engine.poll_timeout(Instant::now()) {
            self.transmit(index).await;
        }
    }

    /// 청크 송신, 실패는 다음 타임아웃 주기에 재시도됨
    async fn transmit(&mut self, index: usize) {
        let packet = match self.engine.chunk(index) {
            Some(chunk) => self.codec.encode(chunk.seq_id, &chunk.data),
            None => return,
        };

        let result = match packet {
            Ok(packet) => self.socket.send(&packet).await.map(|_| ()),
            Err(e) => {
                warn!("패킷 인코딩 실패: index={}, {}", index, e);
                return;
            }
        };

        if let Err(e) = result {
            warn!("청크 송신 실패: index={}, {}", index, e);
            self.engine.record_send_error();
        }
    }

    /// 종료 패킷 반복 전송
    async fn terminate(&mut self) {
        let fin_seq = self.engine.table().fin_seq_id();
        let fin = self.codec.fin_packet(fin_seq);
        let repeat = self.config.fin_repeat;

        for i in 0..repeat {
            if let Err(e) = self.socket.send(&fin).await {
                warn!("종료 패킷 송신 실패: {}", e);
            }
            if i + 1 < repeat {
                tokio::time::sleep(self.config.fin_interval()).await;
            }
        }
        debug!("종료 패킷 {}회 전송: seq={}", repeat, fin_seq);
    }
}
