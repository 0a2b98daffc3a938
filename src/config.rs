//! 전송 설정

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, DEFAULT_PACKET_SIZE, SEQ_ID_SIZE};

/// 전송 방식 (혼잡 제어 정책)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    /// 미확인 청크 최대 1개
    StopAndWait,

    /// 고정 크기 윈도우
    SlidingWindow,

    /// TCP Reno 방식 가변 윈도우
    Reno,
}

impl PolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::StopAndWait => "stop-and-wait",
            PolicyKind::SlidingWindow => "sliding-window",
            PolicyKind::Reno => "reno",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stop-and-wait" | "saw" => Ok(PolicyKind::StopAndWait),
            "sliding-window" | "window" => Ok(PolicyKind::SlidingWindow),
            "reno" => Ok(PolicyKind::Reno),
            other => Err(Error::InvalidConfig(format!("알 수 없는 전송 방식: {other}"))),
        }
    }
}

/// ARQ 전송 설정
///
/// 엔진 생성 시 한 번 넘겨지고 이후 변경되지 않음.
/// 여러 인스턴스가 서로 다른 설정으로 동시에 존재할 수 있음.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// 전송 방식
    pub policy: PolicyKind,

    /// 패킷 크기 (시퀀스 헤더 포함, 바이트)
    pub packet_size: usize,

    /// 고정 윈도우 크기 (청크 수, sliding-window 전용)
    pub window_size: usize,

    /// 재전송 타임아웃 (밀리초)
    pub timeout_ms: u64,

    /// ACK 폴링 대기 시간 (밀리초)
    pub poll_interval_ms: u64,

    /// Reno 초기 cwnd
    pub initial_cwnd: f64,

    /// Reno 초기 ssthresh
    pub initial_ssthresh: f64,

    /// 종료 패킷 반복 전송 횟수
    pub fin_repeat: usize,

    /// 종료 패킷 전송 간격 (밀리초)
    pub fin_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::reno()
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 전송 방식별 기본 설정
    pub fn for_policy(policy: PolicyKind) -> Self {
        match policy {
            PolicyKind::StopAndWait => Self::stop_and_wait(),
            PolicyKind::SlidingWindow => Self::sliding_window(),
            PolicyKind::Reno => Self::reno(),
        }
    }

    /// Stop-and-Wait 설정 (타임아웃 1초, 종료 패킷 간격 0.2초)
    pub fn stop_and_wait() -> Self {
        Self {
            policy: PolicyKind::StopAndWait,
            window_size: 1,
            timeout_ms: 1000,
            fin_interval_ms: 200,
            ..Self::base()
        }
    }

    /// 고정 슬라이딩 윈도우 설정 (윈도우 100, 타임아웃 0.5초)
    pub fn sliding_window() -> Self {
        Self {
            policy: PolicyKind::SlidingWindow,
            ..Self::base()
        }
    }

    /// TCP Reno 설정 (cwnd 1, ssthresh 64, 타임아웃 0.5초)
    pub fn reno() -> Self {
        Self {
            policy: PolicyKind::Reno,
            ..Self::base()
        }
    }

    fn base() -> Self {
        Self {
            policy: PolicyKind::Reno,
            packet_size: DEFAULT_PACKET_SIZE,
            window_size: 100,
            timeout_ms: 500,
            poll_interval_ms: 10,
            initial_cwnd: 1.0,
            initial_ssthresh: 64.0,
            fin_repeat: 5,
            fin_interval_ms: 100,
        }
    }

    /// 청크당 페이로드 크기
    pub fn message_size(&self) -> usize {
        self.packet_size.saturating_sub(SEQ_ID_SIZE)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn fin_interval(&self) -> Duration {
        Duration::from_millis(self.fin_interval_ms)
    }

    /// 설정값 검증
    pub fn validate(&self) -> Result<()> {
        if self.packet_size <= SEQ_ID_SIZE {
            return Err(Error::InvalidConfig(format!(
                "packet_size는 {}보다 커야 함: {}",
                SEQ_ID_SIZE, self.packet_size
            )));
        }
        if self.packet_size > u16::MAX as usize {
            return Err(Error::InvalidConfig(format!(
                "packet_size가 UDP 데이터그램 한계를 넘음: {}",
                self.packet_size
            )));
        }
        if self.window_size == 0 {
            return Err(Error::InvalidConfig("window_size는 1 이상이어야 함".into()));
        }
        if self.initial_cwnd < 1.0 {
            return Err(Error::InvalidConfig(format!(
                "initial_cwnd는 1 이상이어야 함: {}",
                self.initial_cwnd
            )));
        }
        if self.initial_ssthresh < 2.0 {
            return Err(Error::InvalidConfig(format!(
                "initial_ssthresh는 2 이상이어야 함: {}",
                self.initial_ssthresh
            )));
        }
        Ok(())
    }

    /// TOML 문자열에서 설정 로드 (빠진 필드는 해당 전송 방식의 기본값)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        ConfigFile::from_toml_str(content)?.into_config(None)
    }

    /// TOML 파일에서 설정 로드
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        ConfigFile::from_toml_file(path)?.into_config(None)
    }
}

/// 설정 파일 내용
///
/// 파일에 적힌 키만 담김. 전송 방식 기본 설정 위에 덮어씀.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConfigFile {
    pub policy: Option<PolicyKind>,
    pub packet_size: Option<usize>,
    pub window_size: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub initial_cwnd: Option<f64>,
    pub initial_ssthresh: Option<f64>,
    pub fin_repeat: Option<usize>,
    pub fin_interval_ms: Option<u64>,
}

impl ConfigFile {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 설정 생성
    ///
    /// 전송 방식은 `policy` 인자 > 파일 > Reno 순으로 정하고,
    /// 그 방식의 기본 설정에 파일의 나머지 키를 적용함
    pub fn into_config(self, policy: Option<PolicyKind>) -> Result<Config> {
        let policy = policy.or(self.policy).unwrap_or(PolicyKind::Reno);
        let mut config = Config::for_policy(policy);

        if let Some(v) = self.packet_size {
            config.packet_size = v;
        }
        if let Some(v) = self.window_size {
            config.window_size = v;
        }
        if let Some(v) = self.timeout_ms {
            config.timeout_ms = v;
        }
        if let Some(v) = self.poll_interval_ms {
            config.poll_interval_ms = v;
        }
        if let Some(v) = self.initial_cwnd {
            config.initial_cwnd = v;
        }
        if let Some(v) = self.initial_ssthresh {
            config.initial_ssthresh = v;
        }
        if let Some(v) = self.fin_repeat {
            config.fin_repeat = v;
        }
        if let Some(v) = self.fin_interval_ms {
            config.fin_interval_ms = v;
        }

        config.validate()?;
        Ok(config)
    }
}
