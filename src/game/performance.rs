//! Tick budget monitoring
//!
//! Tracks wall-clock tick durations against the fixed-step budget so the
//! runner can report when a round falls behind real time.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Performance status levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceStatus {
    /// Well under budget
    Excellent,
    /// Normal operation
    Good,
    /// Most of the budget is used
    Warning,
    /// At the edge of the budget
    Critical,
    /// Sustained overload; real-time pacing is lost
    Catastrophic,
}

impl PerformanceStatus {
    /// Gauge value for metrics (0 = Excellent .. 4 = Catastrophic)
    pub fn level(&self) -> u64 {
        match self {
            PerformanceStatus::Excellent => 0,
            PerformanceStatus::Good => 1,
            PerformanceStatus::Warning => 2,
            PerformanceStatus::Critical => 3,
            PerformanceStatus::Catastrophic => 4,
        }
    }

    /// Whether the simulation still keeps up with real time
    pub fn keeps_up(&self) -> bool {
        !matches!(self, PerformanceStatus::Catastrophic)
    }
}

/// Performance monitor that tracks tick durations
pub struct PerformanceMonitor {
    /// Rolling window of tick durations
    tick_durations: VecDeque<Duration>,
    max_samples: usize,
    /// Target tick duration (budget)
    target_tick_duration: Duration,
    /// Fractions of the budget separating the status levels
    excellent_threshold: f32,
    warning_threshold: f32,
    critical_threshold: f32,
    catastrophic_threshold: f32,
    status: PerformanceStatus,
    tick_start: Option<Instant>,
    /// Holes plus live objects at last measurement
    last_entity_count: usize,
}

impl PerformanceMonitor {
    pub fn new(tick_rate: u32) -> Self {
        let target_tick_duration = Duration::from_secs_f32(1.0 / tick_rate.max(1) as f32);

        Self {
            tick_durations: VecDeque::with_capacity(120), // ~2 seconds at 60Hz
            max_samples: 120,
            target_tick_duration,
            excellent_threshold: 0.3,
            warning_threshold: 0.7,
            critical_threshold: 0.9,
            catastrophic_threshold: 1.5,
            status: PerformanceStatus::Excellent,
            tick_start: None,
            last_entity_count: 0,
        }
    }

    /// Start timing a tick
    pub fn tick_start(&mut self) {
        self.tick_start = Some(Instant::now());
    }

    /// End timing a tick; returns the measured duration
    pub fn tick_end(&mut self, entity_count: usize) -> Option<Duration> {
        let start = self.tick_start.take()?;
        let duration = start.elapsed();
        self.record_tick(duration);
        self.last_entity_count = entity_count;
        Some(duration)
    }

    fn record_tick(&mut self, duration: Duration) {
        self.tick_durations.push_back(duration);
        while self.tick_durations.len() > self.max_samples {
            self.tick_durations.pop_front();
        }
        self.update_status();
    }

    fn update_status(&mut self) {
        if self.tick_durations.len() < 10 {
            // Not enough data yet
            return;
        }

        let ratio = self.average_tick_duration().as_secs_f32() / self.target_tick_duration.as_secs_f32();

        self.status = if ratio < self.excellent_threshold {
            PerformanceStatus::Excellent
        } else if ratio < self.warning_threshold {
            PerformanceStatus::Good
        } else if ratio < self.critical_threshold {
            PerformanceStatus::Warning
        } else if ratio < self.catastrophic_threshold {
            PerformanceStatus::Critical
        } else {
            PerformanceStatus::Catastrophic
        };
    }

    pub fn average_tick_duration(&self) -> Duration {
        if self.tick_durations.is_empty() {
            return Duration::ZERO;
        }
        let sum: Duration = self.tick_durations.iter().sum();
        sum / self.tick_durations.len() as u32
    }

    /// 95th percentile tick duration
    pub fn p95_tick_duration(&self) -> Duration {
        if self.tick_durations.is_empty() {
            return Duration::ZERO;
        }
        let mut sorted: Vec<_> = self.tick_durations.iter().copied().collect();
        sorted.sort();
        let idx = (sorted.len() as f32 * 0.95) as usize;
        sorted.get(idx.min(sorted.len() - 1)).copied().unwrap_or(Duration::ZERO)
    }

    pub fn status(&self) -> PerformanceStatus {
        self.status
    }

    /// Budget usage as percentage (0-100+)
    pub fn budget_usage_percent(&self) -> f32 {
        let avg = self.average_tick_duration();
        (avg.as_secs_f32() / self.target_tick_duration.as_secs_f32()) * 100.0
    }

    pub fn last_entity_count(&self) -> usize {
        self.last_entity_count
    }

    /// Human-readable status line
    pub fn status_message(&self) -> String {
        format!(
            "{:?} - {:.1}% budget (p95 {:.2}ms), {} entities",
            self.status,
            self.budget_usage_percent(),
            self.p95_tick_duration().as_secs_f64() * 1000.0,
            self.last_entity_count
        )
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor_with(duration: Duration) -> PerformanceMonitor {
        let mut monitor = PerformanceMonitor::new(60);
        for _ in 0..20 {
            monitor.record_tick(duration);
        }
        monitor
    }

    #[test]
    fn test_performance_monitor_new() {
        let monitor = PerformanceMonitor::new(60);
        assert_eq!(monitor.status(), PerformanceStatus::Excellent);
        assert_eq!(monitor.average_tick_duration(), Duration::ZERO);
    }

    #[test]
    fn test_status_levels() {
        // Budget at 60Hz is ~16.67ms
        let cases = [
            (2, PerformanceStatus::Excellent),
            (8, PerformanceStatus::Good),
            (13, PerformanceStatus::Warning),
            (18, PerformanceStatus::Critical),
            (30, PerformanceStatus::Catastrophic),
        ];
        for (ms, expected) in cases {
            let monitor = monitor_with(Duration::from_millis(ms));
            assert_eq!(monitor.status(), expected, "{}ms tick", ms);
        }
    }

    #[test]
    fn test_status_needs_enough_samples() {
        let mut monitor = PerformanceMonitor::new(60);
        for _ in 0..5 {
            monitor.record_tick(Duration::from_millis(30));
        }
        assert_eq!(monitor.status(), PerformanceStatus::Excellent);
    }

    #[test]
    fn test_keeps_up_and_level() {
        assert!(PerformanceStatus::Critical.keeps_up());
        assert!(!PerformanceStatus::Catastrophic.keeps_up());
        assert_eq!(PerformanceStatus::Warning.level(), 2);
    }

    #[test]
    fn test_budget_and_p95() {
        let mut monitor = PerformanceMonitor::new(100); // 10ms budget
        for ms in 1..=20 {
            monitor.record_tick(Duration::from_millis(ms));
        }
        assert!((monitor.budget_usage_percent() - 105.0).abs() < 0.5);
        assert_eq!(monitor.p95_tick_duration(), Duration::from_millis(20));
    }

    #[test]
    fn test_tick_timing() {
        let mut monitor = PerformanceMonitor::new(60);
        assert_eq!(monitor.tick_end(3), None);

        monitor.tick_start();
        std::thread::sleep(Duration::from_millis(1));
        let measured = monitor.tick_end(10);

        assert!(measured.is_some_and(|d| d >= Duration::from_millis(1)));
        assert_eq!(monitor.last_entity_count(), 10);
        assert!(monitor.status_message().contains("10 entities"));
    }
}
