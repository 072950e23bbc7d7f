use std::future::Future;
use std::net::IpAddr;
use std::process::Stdio;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence, SurgeError};
use tokio::process::Command;

use crate::error::ProbeError;
use crate::ping::{ProbeResult, RttStats};

const ICMP_PAYLOAD: [u8; 56] = [0; 56];

static NEXT_IDENTIFIER: AtomicU16 = AtomicU16::new(1);

/// Measures round-trip latency to an address, `count` times.
pub trait Probe: Send + Sync {
    fn probe(
        &self,
        address: &str,
        count: u32,
    ) -> impl Future<Output = Result<ProbeResult, ProbeError>> + Send;
}

/// Shells out to `ping -q -c <count>`; the repetition and min/avg/max/mdev are ping's own.
#[derive(Debug, Clone)]
pub struct PingExecutor {
    program: String,
}

impl PingExecutor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, address: &str, count: u32) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-q")
            .arg("-c")
            .arg(count.to_string())
            .arg(address)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for PingExecutor {
    fn default() -> Self {
        Self::new("ping")
    }
}

impl Probe for PingExecutor {
    async fn probe(&self, address: &str, count: u32) -> Result<ProbeResult, ProbeError> {
        let output = self
            .command(address, count)
            .output()
            .await
            .map_err(ProbeError::Spawn)?;
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            return Err(ProbeError::Exit {
                status: output.status,
                stderr,
            });
        }

        ProbeResult::parse(&String::from_utf8_lossy(&output.stdout))
            .map_err(|source| ProbeError::Parse { stderr, source })
    }
}

/// Sends echo requests in-process and reduces them the way ping does.
#[derive(Debug, Clone)]
pub struct IcmpProber {
    timeout: Duration,
}

impl IcmpProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Probe for IcmpProber {
    async fn probe(&self, address: &str, count: u32) -> Result<ProbeResult, ProbeError> {
        let ip: IpAddr = address
            .parse()
            .map_err(|_| ProbeError::InvalidAddress(address.to_string()))?;
        let requests = u16::try_from(count).map_err(|_| ProbeError::TooManyRequests(count))?;

        let config = match ip {
            IpAddr::V4(_) => Config::default(),
            IpAddr::V6(_) => Config::builder().kind(ICMP::V6).build(),
        };
        let client = Client::new(&config).map_err(ProbeError::Socket)?;

        let identifier = PingIdentifier(NEXT_IDENTIFIER.fetch_add(1, Ordering::Relaxed));
        let mut pinger = client.pinger(ip, identifier).await;
        pinger.timeout(self.timeout);

        let mut samples = Vec::with_capacity(count as usize);
        for seq in 0..requests {
            match pinger.ping(PingSequence(seq), &ICMP_PAYLOAD).await {
                Ok((_, rtt)) => samples.push(rtt.as_secs_f64() * 1000.0),
                Err(SurgeError::Timeout { .. }) => debug!("{address}: icmp_seq={seq} timed out"),
                Err(err) => return Err(err.into()),
            }
        }

        Ok(summarize(count, &samples))
    }
}

/// Reduce raw round-trip samples (ms) into a ping-style summary.
pub fn summarize(transmitted: u32, samples: &[f64]) -> ProbeResult {
    let received = samples.len() as u32;
    let packet_loss = if transmitted > 0 {
        f64::from(transmitted - received.min(transmitted)) / f64::from(transmitted)
    } else {
        0.0
    };

    let rtt = (!samples.is_empty()).then(|| {
        let n = samples.len() as f64;
        let sum: f64 = samples.iter().sum();
        let sum_sq: f64 = samples.iter().map(|s| s * s).sum();
        let avg = sum / n;
        RttStats {
            min: samples.iter().copied().fold(f64::INFINITY, f64::min),
            avg,
            max: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mdev: (sum_sq / n - avg * avg).max(0.0).sqrt(),
        }
    });

    ProbeResult {
        transmitted,
        received,
        packet_loss,
        rtt,
    }
}

/// Which prober a run uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProberKind {
    #[default]
    External,
    Icmp,
}

/// The prober picked at startup.
#[derive(Debug, Clone)]
pub enum ProbeBackend {
    External(PingExecutor),
    Icmp(IcmpProber),
}

impl Probe for ProbeBackend {
    async fn probe(&self, address: &str, count: u32) -> Result<ProbeResult, ProbeError> {
        match self {
            ProbeBackend::External(executor) => executor.probe(address, count).await,
            ProbeBackend::Icmp(prober) => prober.probe(address, count).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_arguments() {
        let cmd = PingExecutor::default().command("142.250.72.14", 3);
        let args: Vec<_> = cmd.as_std().get_args().collect();
        assert_eq!(args, ["-q", "-c", "3", "142.250.72.14"]);
    }

    #[test]
    fn summarize_matches_ping_reduction() {
        let result = summarize(4, &[10.0, 20.0, 30.0]);
        assert_eq!(result.transmitted, 4);
        assert_eq!(result.received, 3);
        assert_eq!(result.packet_loss, 0.25);

        let rtt = result.rtt.unwrap();
        assert_eq!(rtt.min, 10.0);
        assert_eq!(rtt.avg, 20.0);
        assert_eq!(rtt.max, 30.0);
        // sqrt((100 + 400 + 900) / 3 - 400)
        assert!((rtt.mdev - 8.164_965_809).abs() < 1e-6);
    }

    #[test]
    fn summarize_without_replies() {
        let result = summarize(3, &[]);
        assert_eq!(result.received, 0);
        assert_eq!(result.packet_loss, 1.0);
        assert!(result.rtt.is_none());
    }

    #[tokio::test]
    async fn icmp_rejects_hostnames() {
        let prober = IcmpProber::new(Duration::from_millis(100));
        let err = prober.probe("www.example.com.", 1).await.unwrap_err();
        assert!(matches!(err, ProbeError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn icmp_rejects_counts_past_sequence_space() {
        let prober = IcmpProber::new(Duration::from_millis(100));
        let err = prober.probe("127.0.0.1", 70_000).await.unwrap_err();
        assert!(matches!(err, ProbeError::TooManyRequests(70_000)));
    }

    /// Writes a stand-in for ping that records its pid and then hangs.
    #[cfg(target_os = "linux")]
    fn hanging_ping(dir: &std::path::Path) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        std::fs::create_dir_all(dir).unwrap();
        let script = dir.join("hanging-ping");
        let pid_file = dir.join("pid");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho $$ > {}\nexec sleep 30\n", pid_file.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(target_os = "linux")]
    fn is_running(pid: &str) -> bool {
        // a killed child may linger as a zombie until it is reaped
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .and_then(|rest| rest.split_whitespace().next())
                .is_some_and(|state| state != "Z"),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn dropped_ping_future_kills_child() {
        let dir = std::env::temp_dir().join(format!("dns-compare-ping-{}", std::process::id()));
        let executor = PingExecutor::new(hanging_ping(&dir).display().to_string());

        // a freshly written script can briefly fail to exec with ETXTBSY
        let mut hung = false;
        for _ in 0..10 {
            let probe = executor.probe("127.0.0.1", 3);
            match tokio::time::timeout(Duration::from_millis(500), probe).await {
                Err(_) => {
                    hung = true;
                    break;
                }
                Ok(Err(ProbeError::Spawn(_))) => {
                    tokio::time::sleep(Duration::from_millis(20)).await
                }
                Ok(other) => panic!("hanging ping returned {other:?}"),
            }
        }
        assert!(hung, "hanging ping never started");

        let pid = std::fs::read_to_string(dir.join("pid")).unwrap();
        let pid = pid.trim();
        let mut alive = true;
        for _ in 0..40 {
            alive = is_running(pid);
            if !alive {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        let _ = std::fs::remove_dir_all(&dir);
        assert!(!alive, "ping child {pid} outlived the dropped future");
    }

    #[tokio::test]
    async fn missing_ping_is_a_failure() {
        let executor = PingExecutor::new("dns-compare-no-such-ping");
        let err = executor.probe("127.0.0.1", 1).await.unwrap_err();
        assert!(matches!(err, ProbeError::Spawn(_)));
    }
}
