//! 송신 엔진 상태 머신
//!
//! 소켓 I/O 없이 상태만 관리함. 실제 송수신은 [`crate::Sender`]가 담당.
//!
//! ```text
//!  base_index         next_index
//!      │                  │
//!  ────┼──────────────────┼──────────────────▶ chunk index
//!  확인됨 │ <── in flight ──▶│ <── 미전송 ──────▶
//! ```
//!
//! 불변 조건: `0 ≤ base_index ≤ next_index ≤ total_chunks`

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::chunk::{Chunk, ChunkTable, SeqId};
use crate::congestion::{self, CongestionPolicy};
use crate::message::PacketCodec;
use crate::stats::{MetricsCollector, TransferMetrics, TransferStats};
use crate::timer::RetransmissionTimer;
use crate::Config;

/// ACK 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// base가 전진함 (새로 확인된 청크 수)
    New { acked: usize },

    /// base와 같은 ACK, `retransmit`이 있으면 해당 청크를 즉시 재전송해야 함
    Duplicate { retransmit: Option<usize> },

    /// base보다 작은 ACK 또는 전송 완료 후 도착한 ACK
    Stale,
}

/// 송신 엔진
#[derive(Debug)]
pub struct SendEngine {
    table: ChunkTable,
    policy: Box<dyn CongestionPolicy>,
    timer: RetransmissionTimer,

    /// 가장 오래된 미확인 청크 인덱스
    base_index: usize,

    /// 아직 한 번도 보내지 않은 다음 청크 인덱스
    next_index: usize,

    acked: Vec<bool>,
    ack_time: Vec<Option<Instant>>,
    stats: TransferStats,
}

impl SendEngine {
    pub fn new(table: ChunkTable, policy: Box<dyn CongestionPolicy>, timeout: Duration) -> Self {
        let total = table.len();
        Self {
            timer: RetransmissionTimer::new(timeout, total),
            table,
            policy,
            base_index: 0,
            next_index: 0,
            acked: vec![false; total],
            ack_time: vec![None; total],
            stats: TransferStats::new(),
        }
    }

    /// 설정의 전송 방식과 타임아웃으로 엔진 생성
    pub fn from_config(table: ChunkTable, config: &Config) -> Self {
        Self::new(table, congestion::from_config(config), config.timeout())
    }

    pub fn total_chunks(&self) -> usize {
        self.table.len()
    }

    pub fn base_index(&self) -> usize {
        self.base_index
    }

    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// 미확인 상태로 전송 중인 청크 수
    pub fn in_flight(&self) -> usize {
        self.next_index - self.base_index
    }

    /// 모든 청크 확인 완료
    pub fn is_complete(&self) -> bool {
        self.base_index == self.table.len()
    }

    pub fn table(&self) -> &ChunkTable {
        &self.table
    }

    pub fn chunk(&self, index: usize) -> Option<&Chunk> {
        self.table.get(index)
    }

    pub fn policy(&self) -> &dyn CongestionPolicy {
        self.policy.as_ref()
    }

    pub fn timer(&self) -> &RetransmissionTimer {
        &self.timer
    }

    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }

    pub fn is_acked(&self, index: usize) -> bool {
        self.acked.get(index).copied().unwrap_or(false)
    }

    pub fn ack_time(&self, index: usize) -> Option<Instant> {
        self.ack_time.get(index).copied().flatten()
    }

    /// 현재 base 청크의 시퀀스 (완료 시 None = +∞)
    pub fn base_seq(&self) -> Option<SeqId> {
        (!self.is_complete()).then(|| self.table.seq_id(self.base_index))
    }

    /// 윈도우에 여유가 있으면 다음 청크를 송신 기록하고 인덱스 반환
    pub fn next_transmission(&mut self, now: Instant) -> Option<usize> {
        if self.next_index >= self.table.len() || self.in_flight() >= self.policy.window_size() {
            return None;
        }

        let index = self.next_index;
        self.timer.record_send(index, now);
        self.next_index += 1;
        self.stats.chunks_sent += 1;
        trace!("청크 전송: index={}, seq={}", index, self.table.seq_id(index));
        Some(index)
    }

    /// 수신한 ACK 데이터그램 처리 (헤더보다 짧으면 None)
    pub fn on_ack_datagram(&mut self, datagram: &[u8], now: Instant) -> Option<AckOutcome> {
        match PacketCodec::decode_ack(datagram) {
            Some(ack_seq) => Some(self.on_ack(ack_seq, now)),
            None => {
                self.stats.malformed_acks += 1;
                None
            }
        }
    }

    /// 누적 ACK 처리
    ///
    /// `ack_seq`보다 작은 시퀀스의 청크를 모두 확인 처리함
    pub fn on_ack(&mut self, ack_seq: SeqId, now: Instant) -> AckOutcome {
        let base_seq = match self.base_seq() {
            Some(seq) => seq,
            None => {
                self.stats.stale_acks += 1;
                return AckOutcome::Stale;
            }
        };

        if ack_seq > base_seq {
            let old_base = self.base_index;
            while self.base_index < self.table.len()
                && self.table.seq_id(self.base_index) < ack_seq
            {
                let index = self.base_index;
                if !self.acked[index] {
                    self.acked[index] = true;
                    self.ack_time[index] = Some(now);
                }
                self.base_index += 1;
            }
            // 수신측이 보내지 않은 청크까지 확인해도 next는 base 뒤에 있어야 함
            self.next_index = self.next_index.max(self.base_index);

            let acked = self.base_index - old_base;
            self.policy.on_new_ack();
            self.stats.new_acks += 1;
            trace!("새 ACK: ack={}, base {} -> {}", ack_seq, old_base, self.base_index);
            AckOutcome::New { acked }
        } else if ack_seq == base_seq {
            self.stats.duplicate_acks += 1;
            let retransmit = if self.policy.on_dup_ack(base_seq) {
                self.timer.record_send(self.base_index, now);
                self.stats.fast_retransmits += 1;
                self.stats.retransmitted_chunks += 1;
                Some(self.base_index)
            } else {
                None
            };
            AckOutcome::Duplicate { retransmit }
        } else {
            self.stats.stale_acks += 1;
            AckOutcome::Stale
        }
    }

    /// base 청크 타임아웃 검사, 만료 시 재전송할 인덱스 반환
    pub fn poll_timeout(&mut self, now: Instant) -> Option<usize> {
        if self.is_complete() || !self.timer.is_expired(self.base_index, now) {
            return None;
        }

        let index = self.base_index;
        self.policy.on_timeout();
        self.timer.record_send(index, now);
        self.stats.timeouts += 1;
        self.stats.retransmitted_chunks += 1;
        debug!(
            "타임아웃 재전송: seq={}, window={}",
            self.table.seq_id(index),
            self.policy.window_size()
        );
        Some(index)
    }

    /// 송신 실패 기록 (다음 타임아웃 주기에 재전송됨)
    pub fn record_send_error(&mut self) {
        self.stats.send_errors += 1;
    }

    /// 수집된 시각으로 지표 계산
    pub fn metrics(&self, collector: &MetricsCollector) -> TransferMetrics {
        collector.collect(self.timer.first_sent_times(), &self.ack_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::congestion::{FixedWindow, Reno, StopAndWait};

    const MSG: usize = 10;

    fn table(chunks: usize) -> ChunkTable {
        ChunkTable::from_bytes(vec![0u8; chunks * MSG], MSG).unwrap()
    }

    fn engine(chunks: usize, policy: Box<dyn CongestionPolicy>) -> SendEngine {
        SendEngine::new(table(chunks), policy, Duration::from_millis(500))
    }

    fn fill(engine: &mut SendEngine, now: Instant) -> Vec<usize> {
        std::iter::from_fn(|| engine.next_transmission(now)).collect()
    }

    #[test]
    fn test_stop_and_wait_bound() {
        let mut engine = engine(5, Box::new(StopAndWait));
        let now = Instant::now();

        for i in 0..5 {
            assert_eq!(fill(&mut engine, now), vec![i]);
            assert!(engine.in_flight() <= 1);
            assert_eq!(
                engine.on_ack(((i + 1) * MSG) as SeqId, now),
                AckOutcome::New { acked: 1 }
            );
        }
        assert!(engine.is_complete());
        assert!(fill(&mut engine, now).is_empty());
    }

    #[test]
    fn test_fixed_window_bound() {
        let mut engine = engine(20, Box::new(FixedWindow::new(4)));
        let now = Instant::now();

        assert_eq!(fill(&mut engine, now), vec![0, 1, 2, 3]);
        assert_eq!(engine.in_flight(), 4);

        engine.on_ack(2 * MSG as SeqId, now);
        assert_eq!(engine.base_index(), 2);
        assert_eq!(fill(&mut engine, now), vec![4, 5]);
        assert!(engine.in_flight() <= 4);
    }

    #[test]
    fn test_cumulative_ack() {
        let mut engine = engine(10, Box::new(FixedWindow::new(10)));
        let now = Instant::now();
        fill(&mut engine, now);

        // 35는 seq 0, 10, 20, 30을 확인하고 40 이상은 확인하지 않음
        assert_eq!(engine.on_ack(35, now), AckOutcome::New { acked: 4 });
        for i in 0..10 {
            assert_eq!(engine.is_acked(i), i < 4);
        }
        assert_eq!(engine.base_index(), 4);
    }

    #[test]
    fn test_new_ack_calls_policy_once_per_batch() {
        let mut engine = engine(10, Box::new(Reno::default()));
        let now = Instant::now();
        fill(&mut engine, now);

        // cwnd=1 이므로 하나만 보냈지만 누적 ACK는 세 청크를 확인
        engine.on_ack(3 * MSG as SeqId, now);
        assert_eq!(engine.base_index(), 3);
        assert_eq!(engine.next_index(), 3);
        assert_eq!(engine.policy().window_size(), 2);
    }

    #[test]
    fn test_ack_idempotence() {
        let mut engine = engine(4, Box::new(FixedWindow::new(4)));
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(100);
        fill(&mut engine, t0);

        engine.on_ack(2 * MSG as SeqId, t0);
        assert_eq!(engine.on_ack(MSG as SeqId, t1), AckOutcome::Stale);
        assert_eq!(engine.on_ack(2 * MSG as SeqId, t1), AckOutcome::Duplicate { retransmit: None });

        assert_eq!(engine.ack_time(0), Some(t0));
        assert_eq!(engine.ack_time(1), Some(t0));
        assert!(engine.is_acked(1));
        assert_eq!(engine.stats().stale_acks, 1);
    }

    #[test]
    fn test_reno_fast_retransmit_once() {
        let reno = Reno::new(8.0, 64.0);
        let mut engine = engine(10, Box::new(reno));
        let t0 = Instant::now();
        assert_eq!(fill(&mut engine, t0).len(), 8);

        engine.on_ack(MSG as SeqId, t0);
        let t1 = t0 + Duration::from_millis(50);

        let outcomes: Vec<AckOutcome> = (0..4).map(|_| engine.on_ack(MSG as SeqId, t1)).collect();
        let retransmits: Vec<usize> = outcomes
            .iter()
            .filter_map(|o| match o {
                AckOutcome::Duplicate { retransmit } => *retransmit,
                _ => None,
            })
            .collect();

        assert_eq!(retransmits, vec![1]);
        assert_eq!(engine.timer().last_sent(1), Some(t1));
        assert_eq!(engine.timer().first_sent(1), Some(t0));
        assert_eq!(engine.stats().fast_retransmits, 1);
    }

    #[test]
    fn test_timeout_only_base() {
        let mut engine = engine(3, Box::new(Reno::new(4.0, 64.0)));
        let t0 = Instant::now();
        fill(&mut engine, t0);

        assert_eq!(engine.poll_timeout(t0 + Duration::from_millis(500)), None);

        let t1 = t0 + Duration::from_millis(501);
        assert_eq!(engine.poll_timeout(t1), Some(0));
        assert_eq!(engine.policy().window_size(), 1);
        assert_eq!(engine.timer().last_sent(0), Some(t1));

        // 타이머가 갱신되었으므로 바로 다시 만료되지 않음
        assert_eq!(engine.poll_timeout(t1), None);
        assert_eq!(engine.stats().timeouts, 1);
    }

    #[test]
    fn test_malformed_ack() {
        let mut engine = engine(2, Box::new(StopAndWait));
        let now = Instant::now();
        fill(&mut engine, now);

        assert_eq!(engine.on_ack_datagram(&[0, 0], now), None);
        assert_eq!(engine.base_index(), 0);
        assert_eq!(engine.stats().malformed_acks, 1);

        let ack = PacketCodec::encode_ack(MSG as SeqId);
        assert_eq!(
            engine.on_ack_datagram(&ack, now),
            Some(AckOutcome::New { acked: 1 })
        );
    }

    #[test]
    fn test_empty_table_is_complete() {
        let mut engine = engine(0, Box::new(StopAndWait));
        let now = Instant::now();
        assert!(engine.is_complete());
        assert_eq!(engine.next_transmission(now), None);
        assert_eq!(engine.poll_timeout(now), None);
        assert_eq!(engine.on_ack(0, now), AckOutcome::Stale);
    }

    #[test]
    fn test_terminates_with_lossy_acks() {
        // 짝수 번째 ACK를 잃어도 누적 ACK 덕분에 모두 확인됨
        let mut engine = engine(50, Box::new(Reno::default()));
        let mut now = Instant::now();
        let mut received: SeqId = 0;
        let mut round = 0;

        while !engine.is_complete() && round < 10_000 {
            for index in fill(&mut engine, now) {
                if engine.table().seq_id(index) == received {
                    received += MSG as SeqId;
                }
            }
            if round % 2 == 1 {
                engine.on_ack(received, now);
            }
            now += Duration::from_millis(100);
            if let Some(index) = engine.poll_timeout(now) {
                if engine.table().seq_id(index) == received {
                    received += MSG as SeqId;
                }
            }
            round += 1;
        }

        assert!(engine.is_complete());
        assert_eq!(engine.base_index(), engine.total_chunks());
        assert!((0..50).all(|i| engine.ack_time(i).is_some()));
    }
}
