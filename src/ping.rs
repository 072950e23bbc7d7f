use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;

use crate::error::ParseError;

/// Summary of `ping -q`: the statistics line, the optional rtt line, then end of input.
static SUMMARY: Lazy<Regex> = Lazy::new(|| {
    let int = r"\d+";
    let float = r"\d+\.?\d*";
    Regex::new(&format!(
        r"(?m)(?P<transmitted>{int}) packets transmitted, (?P<received>{int}) received, (?:\+{int} errors, )?(?P<loss>{float})% packet loss, time {float}ms\n(?:rtt min/avg/max/mdev = (?P<min>{float})/(?P<avg>{float})/(?P<max>{float})/(?P<mdev>{float}) ms)?\n\z"
    ))
    .expect("ping summary pattern is valid")
});

/// Round-trip statistics in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RttStats {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
    pub mdev: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub transmitted: u32,
    pub received: u32,
    /// Fraction of packets lost, 0.0..=1.0.
    pub packet_loss: f64,
    /// `None` when nothing came back.
    pub rtt: Option<RttStats>,
}

impl ProbeResult {
    pub fn parse(output: &str) -> Result<Self, ParseError> {
        let fail = || ParseError {
            raw: output.to_string(),
        };
        let caps = SUMMARY.captures(output).ok_or_else(fail)?;

        let transmitted = caps["transmitted"].parse().map_err(|_| fail())?;
        let received = caps["received"].parse().map_err(|_| fail())?;
        let loss: f64 = caps["loss"].parse().map_err(|_| fail())?;
        let rtt = match caps.name("min") {
            Some(_) => Some(rtt_stats(&caps).ok_or_else(fail)?),
            None => None,
        };

        Ok(Self {
            transmitted,
            received,
            packet_loss: loss / 100.0,
            rtt,
        })
    }

    /// Best-of-N latency, if anything was received.
    pub fn min(&self) -> Option<f64> {
        self.rtt.map(|rtt| rtt.min)
    }
}

fn rtt_stats(caps: &Captures<'_>) -> Option<RttStats> {
    let field = |name: &str| caps.name(name)?.as_str().parse::<f64>().ok();
    Some(RttStats {
        min: field("min")?,
        avg: field("avg")?,
        max: field("max")?,
        mdev: field("mdev")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const THREE_REPLIES: &str = "\
PING 142.250.72.14 (142.250.72.14) 56(84) bytes of data.

--- 142.250.72.14 ping statistics ---
3 packets transmitted, 3 received, 0% packet loss, time 2003ms
rtt min/avg/max/mdev = 11.204/12.870/15.011/1.595 ms
";

    const ALL_LOST: &str = "\
PING 10.255.255.1 (10.255.255.1) 56(84) bytes of data.

--- 10.255.255.1 ping statistics ---
3 packets transmitted, 0 received, 100% packet loss, time 2047ms

";

    #[test]
    fn parses_full_summary() {
        let result = ProbeResult::parse(THREE_REPLIES).unwrap();
        assert_eq!(result.transmitted, 3);
        assert_eq!(result.received, 3);
        assert_eq!(result.packet_loss, 0.0);
        assert_eq!(
            result.rtt,
            Some(RttStats {
                min: 11.204,
                avg: 12.870,
                max: 15.011,
                mdev: 1.595,
            })
        );
        assert_eq!(result.min(), Some(11.204));
    }

    #[test]
    fn loss_is_a_fraction() {
        let output = "4 packets transmitted, 3 received, 25% packet loss, time 3004ms\n\
                      rtt min/avg/max/mdev = 9/10.5/12/1.1 ms\n";
        let result = ProbeResult::parse(output).unwrap();
        assert_eq!(result.packet_loss, 0.25);
        assert_eq!(result.min(), Some(9.0));
    }

    #[test]
    fn accepts_error_count() {
        let output = "2 packets transmitted, 0 received, +2 errors, 100% packet loss, time 1001ms\n\n";
        let result = ProbeResult::parse(output).unwrap();
        assert_eq!(result.transmitted, 2);
        assert_eq!(result.received, 0);
    }

    #[test]
    fn total_loss_has_no_latency() {
        let result = ProbeResult::parse(ALL_LOST).unwrap();
        assert_eq!(result.received, 0);
        assert_eq!(result.packet_loss, 1.0);
        assert!(result.rtt.is_none());
        assert!(result.min().is_none());
    }

    #[test]
    fn rejects_missing_statistics_line() {
        let output = "PING example.com (93.184.216.34) 56(84) bytes of data.\n";
        let err = ProbeResult::parse(output).unwrap_err();
        assert_eq!(err.raw, output);
    }

    #[test]
    fn rejects_trailing_content() {
        let output = format!("{THREE_REPLIES}unexpected\n");
        assert!(ProbeResult::parse(&output).is_err());
    }
}
