//! 재전송 타이머
//!
//! RTT 추정 없이 전송 방식별 고정 임계값만 사용.
//! 엔진은 매 루프마다 가장 오래된 미확인 청크 하나만 검사함.

use std::time::{Duration, Instant};

/// 청크별 송신 시각 기록 + 만료 판정
#[derive(Debug, Clone)]
pub struct RetransmissionTimer {
    /// 만료 임계값
    threshold: Duration,

    /// 최초 송신 시각 (한 번만 기록)
    first_sent: Vec<Option<Instant>>,

    /// 마지막 (재)송신 시각
    last_sent: Vec<Option<Instant>>,
}

impl RetransmissionTimer {
    pub fn new(threshold: Duration, total_chunks: usize) -> Self {
        Self {
            threshold,
            first_sent: vec![None; total_chunks],
            last_sent: vec![None; total_chunks],
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// 송신 기록
    pub fn record_send(&mut self, index: usize, now: Instant) {
        if let Some(first @ None) = self.first_sent.get_mut(index) {
            *first = Some(now);
        }
        if let Some(last) = self.last_sent.get_mut(index) {
            *last = Some(now);
        }
    }

    pub fn first_sent(&self, index: usize) -> Option<Instant> {
        self.first_sent.get(index).copied().flatten()
    }

    pub fn last_sent(&self, index: usize) -> Option<Instant> {
        self.last_sent.get(index).copied().flatten()
    }

    /// 만료 여부 (한 번도 보내지 않은 청크는 만료되지 않음)
    pub fn is_expired(&self, index: usize, now: Instant) -> bool {
        match self.last_sent(index) {
            Some(sent) => now.saturating_duration_since(sent) > self.threshold,
            None => false,
        }
    }

    /// 최초 송신 시각 전체 (지표 계산용)
    pub fn first_sent_times(&self) -> &[Option<Instant>] {
        &self.first_sent
    }
}
