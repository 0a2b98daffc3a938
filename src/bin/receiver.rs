//! ARQ 수신자 - 누적 ACK 참조 수신자
//!
//! 예시:
//!   cargo run --release --bin arq-receiver -- --bind 0.0.0.0:5001 --output received.bin
//!
//!   # 수신 데이터 패킷 10% 손실 시뮬레이션
//!   cargo run --release --bin arq-receiver -- -o received.bin --loss 0.1 --seed 7

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use arq::{Receiver, DEFAULT_PACKET_SIZE};

#[derive(Parser, Debug)]
#[command(author, version, about = "Cumulative-ACK receiver for arq-sender")]
struct Args {
    /// 바인드 주소
    #[arg(short, long, default_value = "0.0.0.0:5001")]
    bind: SocketAddr,

    /// 수신 데이터 저장 경로
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 최대 패킷 크기 (헤더 포함)
    #[arg(long, default_value_t = DEFAULT_PACKET_SIZE)]
    packet_size: usize,

    /// 데이터 패킷 손실률 (0.0 ~ 1.0)
    #[arg(long, default_value_t = 0.0)]
    loss: f64,

    /// 손실 시뮬레이션 시드
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// 유휴 타임아웃 (초, 0이면 무제한)
    #[arg(long, default_value_t = 0)]
    idle_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("ARQ Receiver starting...");
    info!("Bind address: {}", args.bind);
    if args.loss > 0.0 {
        info!("Simulated loss: {:.1}% (seed {})", args.loss * 100.0, args.seed);
    }

    let mut receiver = Receiver::bind(args.bind)
        .await?
        .with_packet_size(args.packet_size);
    if args.loss > 0.0 {
        receiver = receiver.with_loss(args.loss, args.seed);
    }
    if args.idle_timeout > 0 {
        receiver = receiver.with_idle_timeout(Duration::from_secs(args.idle_timeout));
    }

    let received = receiver.receive().await?;

    info!("Received {} bytes", received.data.len());
    info!("  Packets: {}", received.stats.packets_received);
    info!("  Out of order: {}", received.stats.out_of_order_packets);
    info!("  Duplicates: {}", received.stats.duplicate_packets);
    info!("  Dropped (simulated): {}", received.stats.dropped_packets);
    info!("  Dropped (buffer full): {}", received.stats.overflow_packets);

    if let Some(path) = &args.output {
        std::fs::write(path, &received.data)?;
        info!("Saved to {:?}", path);
    }

    Ok(())
}
