//! 전송 통계와 성능 지표

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::PolicyKind;

/// 전송 카운터
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferStats {
    /// 최초 전송된 청크 수
    pub chunks_sent: u64,

    /// 재전송 청크 수 (타임아웃 + Fast Retransmit)
    pub retransmitted_chunks: u64,

    /// 타임아웃 발생 수
    pub timeouts: u64,

    /// Fast Retransmit 발생 수
    pub fast_retransmits: u64,

    /// base를 전진시킨 ACK 수
    pub new_acks: u64,

    /// 중복 ACK 수
    pub duplicate_acks: u64,

    /// base보다 작은 ACK 수
    pub stale_acks: u64,

    /// 헤더보다 짧은 ACK 수
    pub malformed_acks: u64,

    /// 소켓 송신 실패 수
    pub send_errors: u64,
}

impl TransferStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 송신한 전체 데이터 패킷 수
    pub fn packets_sent(&self) -> u64 {
        self.chunks_sent + self.retransmitted_chunks
    }

    /// 재전송 비율
    pub fn retransmit_ratio(&self) -> f64 {
        let total = self.packets_sent();
        if total == 0 {
            return 0.0;
        }
        self.retransmitted_chunks as f64 / total as f64
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Chunks: {} | Retransmits: {} ({:.2}%) | Timeouts: {} | Fast retransmits: {} | ACKs: new {} / dup {} / stale {} / malformed {}",
            self.chunks_sent,
            self.retransmitted_chunks,
            self.retransmit_ratio() * 100.0,
            self.timeouts,
            self.fast_retransmits,
            self.new_acks,
            self.duplicate_acks,
            self.stale_acks,
            self.malformed_acks,
        )
    }
}

/// 전송 결과 지표
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TransferMetrics {
    /// 처리율 (bytes/sec)
    pub throughput: f64,

    /// 평균 ACK 지연 (초): 최초 송신 ~ 누적 확인
    pub avg_delay: f64,

    /// 종합 점수: 0.3 × (throughput / 1000) + 0.7 / avg_delay
    pub performance: f64,
}

impl TransferMetrics {
    /// 경과 시간, 전송 바이트, 청크별 지연에서 지표 계산
    pub fn calculate<I>(elapsed: Duration, total_bytes: u64, delays: I) -> Self
    where
        I: IntoIterator<Item = Duration>,
    {
        let duration = elapsed.as_secs_f64();
        let throughput = if duration > 0.0 {
            total_bytes as f64 / duration
        } else {
            0.0
        };

        let (sum, samples) = delays
            .into_iter()
            .fold((0.0, 0u64), |(sum, n), d| (sum + d.as_secs_f64(), n + 1));
        let avg_delay = if samples > 0 { sum / samples as f64 } else { 0.0 };

        let performance = if avg_delay > 0.0 {
            0.3 * (throughput / 1000.0) + 0.7 / avg_delay
        } else {
            0.0
        };

        Self {
            throughput,
            avg_delay,
            performance,
        }
    }
}

impl fmt::Display for TransferMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.7}, {:.7}, {:.7}",
            self.throughput, self.avg_delay, self.performance
        )
    }
}

/// 전송 1회의 최종 결과
#[derive(Debug, Clone, Serialize)]
pub struct TransferReport {
    /// 사용한 전송 방식
    pub policy: PolicyKind,

    /// 전송한 파일 크기 (바이트)
    pub total_bytes: u64,

    /// 첫 송신부터 마지막 ACK까지 걸린 시간
    pub elapsed: Duration,

    /// 성능 지표
    pub metrics: TransferMetrics,

    /// 전송 카운터
    pub stats: TransferStats,
}

/// 전송 시각 기록 → 지표 계산
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    start: Instant,
    end: Option<Instant>,
    total_bytes: u64,
}

impl MetricsCollector {
    /// 지금부터 측정 시작
    pub fn start(total_bytes: u64) -> Self {
        Self::with_start(Instant::now(), total_bytes)
    }

    pub fn with_start(start: Instant, total_bytes: u64) -> Self {
        Self {
            start,
            end: None,
            total_bytes,
        }
    }

    /// 측정 종료 (처음 호출만 유효)
    pub fn finish(&mut self, end: Instant) {
        if self.end.is_none() {
            self.end = Some(end);
        }
    }

    /// 경과 시간 (종료 전이면 현재까지)
    pub fn elapsed(&self) -> Duration {
        let end = self.end.unwrap_or_else(Instant::now);
        end.saturating_duration_since(self.start)
    }

    /// 최초 송신/확인 시각이 모두 있는 청크만 지연 표본으로 사용
    pub fn collect(
        &self,
        first_sent: &[Option<Instant>],
        ack_times: &[Option<Instant>],
    ) -> TransferMetrics {
        let delays = first_sent
            .iter()
            .zip(ack_times)
            .filter_map(|(sent, acked)| match (sent, acked) {
                (Some(sent), Some(acked)) => Some(acked.saturating_duration_since(*sent)),
                _ => None,
            });

        TransferMetrics::calculate(self.elapsed(), self.total_bytes, delays)
    }
}
