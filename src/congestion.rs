//! 혼잡 제어 정책
//!
//! 세 가지 전송 방식이 같은 인터페이스를 구현하며 생성 시점에 선택됨.
//!
//! ```text
//!            new ACK (cwnd < ssthresh)
//!           ┌─────────┐
//!           ▼         │
//!     ┌────────────┐  │  cwnd ≥ ssthresh   ┌──────────────────────┐
//!     │ SLOW START │──┴──────────────────▶ │ CONGESTION AVOIDANCE │
//!     └────────────┘                       └──────────────────────┘
//!        ▲      │ 3 dup ACK                    │ 3 dup ACK
//!        │      ▼                              ▼
//!        │   ┌───────────────┐  new ACK   (cwnd = ssthresh)
//!        │   │ FAST RECOVERY │ ─────────────────▶ CONGESTION AVOIDANCE
//!        │   └───────────────┘
//!        └── timeout (cwnd = 1) ── 모든 상태에서
//! ```

use std::fmt;

use tracing::debug;

use crate::chunk::SeqId;
use crate::config::{Config, PolicyKind};

/// Fast Retransmit 진입 중복 ACK 수
pub const DUP_ACK_THRESHOLD: u32 = 3;

/// 혼잡 제어 정책 인터페이스
pub trait CongestionPolicy: fmt::Debug + Send {
    /// 허용되는 최대 미확인 청크 수
    fn window_size(&self) -> usize;

    /// 새 데이터를 확인하는 ACK 처리 (한 번에 여러 청크가 확인되어도 1회 호출)
    fn on_new_ack(&mut self);

    /// 중복 ACK 처리, 즉시 재전송이 필요하면 true
    fn on_dup_ack(&mut self, missing_seq: SeqId) -> bool;

    /// 재전송 타임아웃 처리
    fn on_timeout(&mut self);

    /// 로그용 이름
    fn name(&self) -> &'static str;
}

/// 설정의 전송 방식에 맞는 정책 생성
pub fn from_config(config: &Config) -> Box<dyn CongestionPolicy> {
    match config.policy {
        PolicyKind::StopAndWait => Box::new(StopAndWait),
        PolicyKind::SlidingWindow => Box::new(FixedWindow::new(config.window_size)),
        PolicyKind::Reno => Box::new(Reno::new(config.initial_cwnd, config.initial_ssthresh)),
    }
}

/// Stop-and-Wait: 한 번에 하나의 청크만 미확인 상태로 허용
#[derive(Debug, Clone, Copy, Default)]
pub struct StopAndWait;

impl CongestionPolicy for StopAndWait {
    fn window_size(&self) -> usize {
        1
    }

    fn on_new_ack(&mut self) {}

    fn on_dup_ack(&mut self, _missing_seq: SeqId) -> bool {
        false
    }

    fn on_timeout(&mut self) {}

    fn name(&self) -> &'static str {
        "stop-and-wait"
    }
}

/// 고정 크기 슬라이딩 윈도우
#[derive(Debug, Clone, Copy)]
pub struct FixedWindow {
    window_size: usize,
}

impl FixedWindow {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size: window_size.max(1),
        }
    }
}

impl CongestionPolicy for FixedWindow {
    fn window_size(&self) -> usize {
        self.window_size
    }

    fn on_new_ack(&mut self) {}

    fn on_dup_ack(&mut self, _missing_seq: SeqId) -> bool {
        false
    }

    fn on_timeout(&mut self) {}

    fn name(&self) -> &'static str {
        "sliding-window"
    }
}

/// TCP Reno 혼잡 제어
#[derive(Debug, Clone)]
pub struct Reno {
    /// 혼잡 윈도우 (청크 단위, ≥ 1)
    cwnd: f64,

    /// Slow Start 임계값 (≥ 2)
    ssthresh: f64,

    /// 연속 중복 ACK 수
    dup_ack_count: u32,

    /// Fast Recovery 진행 중
    in_fast_recovery: bool,
}

impl Default for Reno {
    fn default() -> Self {
        Self::new(1.0, 64.0)
    }
}

impl Reno {
    pub fn new(initial_cwnd: f64, initial_ssthresh: f64) -> Self {
        Self {
            cwnd: initial_cwnd.max(1.0),
            ssthresh: initial_ssthresh.max(2.0),
            dup_ack_count: 0,
            in_fast_recovery: false,
        }
    }

    pub fn cwnd(&self) -> f64 {
        self.cwnd
    }

    pub fn ssthresh(&self) -> f64 {
        self.ssthresh
    }

    pub fn dup_ack_count(&self) -> u32 {
        self.dup_ack_count
    }

    pub fn in_fast_recovery(&self) -> bool {
        self.in_fast_recovery
    }

    /// 손실 시 새 ssthresh
    fn halved_cwnd(&self) -> f64 {
        (self.cwnd / 2.0).max(2.0)
    }
}

impl CongestionPolicy for Reno {
    fn window_size(&self) -> usize {
        self.cwnd.floor() as usize
    }

    fn on_new_ack(&mut self) {
        if self.in_fast_recovery {
            // 윈도우 수축
            self.cwnd = self.ssthresh;
            self.in_fast_recovery = false;
            debug!("Fast Recovery 종료: cwnd={:.2}", self.cwnd);
        }
        self.dup_ack_count = 0;

        if self.cwnd < self.ssthresh {
            self.cwnd += 1.0;
        } else {
            self.cwnd += 1.0 / self.cwnd;
        }
    }

    fn on_dup_ack(&mut self, missing_seq: SeqId) -> bool {
        self.dup_ack_count += 1;

        if self.dup_ack_count == DUP_ACK_THRESHOLD {
            self.ssthresh = self.halved_cwnd();
            self.cwnd = self.ssthresh + 3.0;
            self.in_fast_recovery = true;
            debug!(
                "Fast Retransmit: seq={}, ssthresh={:.2}, cwnd={:.2}",
                missing_seq, self.ssthresh, self.cwnd
            );
            return true;
        }

        if self.dup_ack_count > DUP_ACK_THRESHOLD {
            // 윈도우 팽창
            self.cwnd += 1.0;
        }
        false
    }

    fn on_timeout(&mut self) {
        self.ssthresh = self.halved_cwnd();
        self.cwnd = 1.0;
        self.dup_ack_count = 0;
        self.in_fast_recovery = false;
        debug!("타임아웃: ssthresh={:.2}, cwnd=1", self.ssthresh);
    }

    fn name(&self) -> &'static str {
        "reno"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reno_with_cwnd(cwnd: f64) -> Reno {
        Reno {
            cwnd,
            ..Reno::default()
        }
    }

    #[test]
    fn test_fixed_policies() {
        let mut saw = StopAndWait;
        saw.on_timeout();
        assert!(!saw.on_dup_ack(0));
        assert_eq!(saw.window_size(), 1);

        let mut window = FixedWindow::new(100);
        window.on_new_ack();
        window.on_timeout();
        assert!(!window.on_dup_ack(0));
        assert_eq!(window.window_size(), 100);
    }

    #[test]
    fn test_reno_initial_state() {
        let reno = Reno::default();
        assert_eq!(reno.cwnd(), 1.0);
        assert_eq!(reno.ssthresh(), 64.0);
        assert_eq!(reno.dup_ack_count(), 0);
        assert!(!reno.in_fast_recovery());
        assert_eq!(reno.window_size(), 1);
    }

    #[test]
    fn test_reno_slow_start() {
        for k in [1usize, 10, 63] {
            let mut reno = Reno::default();
            for _ in 0..k {
                reno.on_new_ack();
            }
            assert_eq!(reno.cwnd(), 1.0 + k as f64);
        }
    }

    #[test]
    fn test_reno_congestion_avoidance() {
        let mut reno = Reno::new(64.0, 64.0);
        reno.on_new_ack();
        assert!((reno.cwnd() - (64.0 + 1.0 / 64.0)).abs() < 1e-12);
        assert_eq!(reno.window_size(), 64);
    }

    #[test]
    fn test_reno_fast_retransmit() {
        let mut reno = reno_with_cwnd(20.0);

        assert!(!reno.on_dup_ack(1020));
        assert!(!reno.on_dup_ack(1020));
        assert!(reno.on_dup_ack(1020));

        assert_eq!(reno.ssthresh(), 10.0);
        assert_eq!(reno.cwnd(), 13.0);
        assert!(reno.in_fast_recovery());

        // 4번째 이후는 재전송 없이 팽창만
        assert!(!reno.on_dup_ack(1020));
        assert_eq!(reno.cwnd(), 14.0);
    }

    #[test]
    fn test_reno_fast_retransmit_small_window() {
        let mut reno = reno_with_cwnd(3.0);
        let retransmits = (0..3).filter(|_| reno.on_dup_ack(0)).count();

        assert_eq!(retransmits, 1);
        assert_eq!(reno.ssthresh(), 2.0);
        assert_eq!(reno.cwnd(), 5.0);
    }

    #[test]
    fn test_reno_recovery_exit_deflates() {
        let mut reno = reno_with_cwnd(20.0);
        for _ in 0..5 {
            reno.on_dup_ack(0);
        }
        assert_eq!(reno.cwnd(), 15.0);

        reno.on_new_ack();
        assert!(!reno.in_fast_recovery());
        assert_eq!(reno.dup_ack_count(), 0);
        // cwnd = ssthresh(10) 이후 혼잡 회피 증가
        assert!((reno.cwnd() - 10.1).abs() < 1e-12);
    }

    #[test]
    fn test_reno_timeout() {
        let mut reno = reno_with_cwnd(20.0);
        reno.on_dup_ack(0);
        reno.on_dup_ack(0);
        reno.on_dup_ack(0);
        reno.on_timeout();

        assert_eq!(reno.ssthresh(), 6.5);
        assert_eq!(reno.cwnd(), 1.0);
        assert_eq!(reno.dup_ack_count(), 0);
        assert!(!reno.in_fast_recovery());

        let mut reno = reno_with_cwnd(1.0);
        reno.on_timeout();
        assert_eq!(reno.ssthresh(), 2.0);
    }

    #[test]
    fn test_window_floor() {
        let reno = reno_with_cwnd(2.99);
        assert_eq!(reno.window_size(), 2);
    }

    #[test]
    fn test_from_config() {
        let policy = from_config(&Config::stop_and_wait());
        assert_eq!(policy.name(), "stop-and-wait");
        assert_eq!(policy.window_size(), 1);

        let config = Config {
            window_size: 8,
            ..Config::sliding_window()
        };
        assert_eq!(from_config(&config).window_size(), 8);

        assert_eq!(from_config(&Config::reno()).name(), "reno");
    }
}
