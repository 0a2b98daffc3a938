//! ARQ 송신자
//!
//! 파일을 선택한 전송 방식으로 수신자에게 보낸 뒤 지표를 출력
//! (`throughput, avg_delay, performance`)
//!
//! 예시:
//!   cargo run --release --bin arq-sender -- --file data.bin --policy reno
//!
//!   # 고정 윈도우 32, 타임아웃 200ms
//!   cargo run --release --bin arq-sender -- -f data.bin -p sliding-window --window 32 --timeout-ms 200

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use arq::{Config, ConfigFile, PolicyKind, Sender};

#[derive(Parser, Debug)]
#[command(author, version, about = "Send a file over UDP with stop-and-wait, sliding window or Reno")]
struct Args {
    /// 수신자 주소
    #[arg(short, long, default_value = "127.0.0.1:5001")]
    receiver: SocketAddr,

    /// 로컬 바인드 주소
    #[arg(short, long, default_value = "0.0.0.0:0")]
    bind: SocketAddr,

    /// 전송할 파일
    #[arg(short, long)]
    file: PathBuf,

    /// 전송 방식 (stop-and-wait | sliding-window | reno)
    #[arg(short, long)]
    policy: Option<PolicyKind>,

    /// TOML 설정 파일 (빠진 값은 기본값)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 고정 윈도우 크기
    #[arg(long)]
    window: Option<usize>,

    /// 재전송 타임아웃 (밀리초)
    #[arg(long)]
    timeout_ms: Option<u64>,
}

impl Args {
    /// 설정 파일 → 전송 방식 기본값 → 명령행 옵션 순으로 적용
    fn into_config(self) -> arq::Result<(Config, Self)> {
        let mut config = match &self.config {
            Some(path) => ConfigFile::from_toml_file(path)?.into_config(self.policy)?,
            None => Config::for_policy(self.policy.unwrap_or(PolicyKind::Reno)),
        };

        if let Some(window) = self.window {
            config.window_size = window;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }

        config.validate()?;
        Ok((config, self))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정 (stdout은 지표 출력용)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (config, args) = Args::parse().into_config()?;

    info!("ARQ Sender starting...");
    info!("Receiver address: {}", args.receiver);
    info!("Policy: {}", config.policy);
    info!("Packet size: {} bytes", config.packet_size);
    info!("Timeout: {} ms", config.timeout_ms);
    info!("Loading file: {:?}", args.file);

    let sender = Sender::from_file(config, args.bind, args.receiver, &args.file).await?;
    info!("Bound to local address: {}", sender.local_addr()?);

    let report = sender.run().await?;

    info!("Transfer complete!");
    info!("  Time: {:.2}s", report.elapsed.as_secs_f64());
    info!("  Throughput: {:.2} KB/s", report.metrics.throughput / 1000.0);
    info!("  {}", report.stats.summary());

    println!("{}", report.metrics);
    Ok(())
}
