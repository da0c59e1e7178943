//! Composite stability score

use crate::types::LatencyResult;

/// Score a measurement on 0..=100.
///
/// Four sub-scores (latency, jitter, loss, speed) are clamped to 0..=100 and
/// averaged, rounding down. An unavailable throughput reading arrives as
/// 0 Mbps and scores a zero speed component like any other reading.
pub fn stability_score(latency: &LatencyResult, download_mbps: f64) -> u32 {
    let latency_score = 100u32.saturating_sub(latency.average_ms);
    let jitter_score = 100u32.saturating_sub(latency.jitter_ms.saturating_mul(2));
    let loss_score = 100u32.saturating_sub(latency.packet_loss_pct.saturating_mul(5));
    let speed_score = if download_mbps.is_finite() && download_mbps > 0.0 {
        (download_mbps * 4.0).min(100.0) as u32
    } else {
        0
    };

    (latency_score + jitter_score + loss_score + speed_score) / 4
}

#[cfg(test)]
mod tests {
    use super::*;

    fn latency(average_ms: u32, jitter_ms: u32, packet_loss_pct: u32) -> LatencyResult {
        LatencyResult {
            average_ms,
            jitter_ms,
            packet_loss_pct,
        }
    }

    #[test]
    fn test_reference_score() {
        // 80 + 92 + 100 + 100 (capped)
        assert_eq!(stability_score(&latency(20, 4, 0), 50.0), 93);
    }

    #[test]
    fn test_perfect_line_without_throughput() {
        assert_eq!(stability_score(&latency(0, 0, 0), 0.0), 75);
    }

    #[test]
    fn test_clamped_at_zero() {
        assert_eq!(stability_score(&latency(500, 300, 100), 0.0), 0);
        assert_eq!(stability_score(&latency(u32::MAX, u32::MAX, 100), f64::NAN), 0);
    }

    #[test]
    fn test_speed_component_rounds_down() {
        // 100 + 100 + 100 + 10
        assert_eq!(stability_score(&latency(0, 0, 0), 2.6), 77);
    }

    #[test]
    fn test_always_in_range() {
        for avg in [0, 1, 50, 99, 100, 1000] {
            for jitter in [0, 10, 49, 51, 400] {
                for loss in [0, 5, 20, 100] {
                    for mbps in [0.0, 0.5, 24.99, 25.0, 900.0] {
                        let score = stability_score(&latency(avg, jitter, loss), mbps);
                        assert!(score <= 100);
                    }
                }
            }
        }
    }
}
