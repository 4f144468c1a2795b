//! Prometheus-compatible metrics endpoint
//!
//! Exposes round metrics in Prometheus format.
//! Endpoint: http://localhost:<METRICS_PORT>/metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::game::events::SimEvent;
use crate::game::mode::{RoundPhase, RoundState};
use crate::game::performance::PerformanceMonitor;

/// Metrics registry for a running round
#[derive(Debug)]
pub struct SimMetrics {
    // Entity counts
    pub holes_total: AtomicU64,
    pub holes_alive: AtomicU64,
    pub objects_remaining: AtomicU64,

    // Gameplay counters
    pub captures_total: AtomicU64,
    pub eliminations_total: AtomicU64,
    pub respawns_total: AtomicU64,

    // Tick timing (microseconds)
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,
    pub tick_count: AtomicU64,

    // Performance status (0=Excellent .. 4=Catastrophic)
    pub performance_status: AtomicU64,
    pub budget_usage_percent: AtomicU64,

    // Round state
    pub round_time_seconds: AtomicU64,
    pub round_phase: AtomicU64, // 0=Countdown, 1=Playing, 2=RoundEnd
    pub city_consumed_percent: AtomicU64, // Stored x100 (e.g. 12.34% = 1234)

    start_time: Instant,

    // Rolling tick times for percentile calculation
    tick_history: RwLock<VecDeque<u64>>,
}

impl SimMetrics {
    pub fn new() -> Self {
        Self {
            holes_total: AtomicU64::new(0),
            holes_alive: AtomicU64::new(0),
            objects_remaining: AtomicU64::new(0),
            captures_total: AtomicU64::new(0),
            eliminations_total: AtomicU64::new(0),
            respawns_total: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            performance_status: AtomicU64::new(0),
            budget_usage_percent: AtomicU64::new(0),
            round_time_seconds: AtomicU64::new(0),
            round_phase: AtomicU64::new(0),
            city_consumed_percent: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(1000)),
        }
    }

    /// Record a tick time and update percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > 1000 {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.tick_time_p95_us.store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_p99_us.store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_max_us.store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    /// Count gameplay events of one tick
    pub fn observe_events(&self, events: &[SimEvent]) {
        for event in events {
            let counter = match event {
                SimEvent::ObjectCaptured { .. } => &self.captures_total,
                SimEvent::HoleEliminated { .. } => &self.eliminations_total,
                SimEvent::HoleRespawned { .. } => &self.respawns_total,
                SimEvent::RoundEnded { .. } => continue,
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Copy round gauges after a tick
    pub fn observe_round(&self, round: &RoundState, holes_total: usize, objects_remaining: usize) {
        self.holes_total.store(holes_total as u64, Ordering::Relaxed);
        self.holes_alive.store(round.alive_count as u64, Ordering::Relaxed);
        self.objects_remaining.store(objects_remaining as u64, Ordering::Relaxed);
        self.round_time_seconds.store(round.elapsed_time as u64, Ordering::Relaxed);
        self.round_phase.store(
            match round.phase {
                RoundPhase::Countdown => 0,
                RoundPhase::Playing => 1,
                RoundPhase::RoundEnd => 2,
            },
            Ordering::Relaxed,
        );
        self.city_consumed_percent
            .store((round.percent_city_consumed * 100.0).round() as u64, Ordering::Relaxed);
    }

    /// Copy budget status from the performance monitor
    pub fn observe_performance(&self, monitor: &PerformanceMonitor) {
        self.performance_status.store(monitor.status().level(), Ordering::Relaxed);
        self.budget_usage_percent
            .store(monitor.budget_usage_percent().round() as u64, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("hole_royale_holes_total", "Holes in the round", "gauge",
            self.holes_total.load(Ordering::Relaxed));
        metric!("hole_royale_holes_alive", "Holes currently alive", "gauge",
            self.holes_alive.load(Ordering::Relaxed));
        metric!("hole_royale_objects_remaining", "Objects not yet captured", "gauge",
            self.objects_remaining.load(Ordering::Relaxed));

        metric!("hole_royale_captures_total", "Objects captured", "counter",
            self.captures_total.load(Ordering::Relaxed));
        metric!("hole_royale_eliminations_total", "Holes eliminated", "counter",
            self.eliminations_total.load(Ordering::Relaxed));
        metric!("hole_royale_respawns_total", "Holes respawned", "counter",
            self.respawns_total.load(Ordering::Relaxed));

        metric!("hole_royale_tick_time_microseconds", "Current tick time in microseconds", "gauge",
            self.tick_time_us.load(Ordering::Relaxed));
        metric!("hole_royale_tick_time_p95_microseconds", "95th percentile tick time", "gauge",
            self.tick_time_p95_us.load(Ordering::Relaxed));
        metric!("hole_royale_tick_time_p99_microseconds", "99th percentile tick time", "gauge",
            self.tick_time_p99_us.load(Ordering::Relaxed));
        metric!("hole_royale_tick_time_max_microseconds", "Maximum tick time", "gauge",
            self.tick_time_max_us.load(Ordering::Relaxed));
        metric!("hole_royale_tick_count", "Total ticks processed", "counter",
            self.tick_count.load(Ordering::Relaxed));

        metric!("hole_royale_performance_status", "Performance status (0=Excellent, 4=Catastrophic)", "gauge",
            self.performance_status.load(Ordering::Relaxed));
        metric!("hole_royale_budget_usage_percent", "Tick budget usage percentage", "gauge",
            self.budget_usage_percent.load(Ordering::Relaxed));

        metric!("hole_royale_round_time_seconds", "Elapsed round time", "gauge",
            self.round_time_seconds.load(Ordering::Relaxed));
        metric!("hole_royale_round_phase", "Round phase (0=Countdown, 1=Playing, 2=RoundEnd)", "gauge",
            self.round_phase.load(Ordering::Relaxed));
        metric!("hole_royale_city_consumed_percent", "Share of object value captured", "gauge",
            format!("{:.2}", self.city_consumed_percent.load(Ordering::Relaxed) as f64 / 100.0));
        metric!("hole_royale_uptime_seconds", "Runner uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }
}

impl Default for SimMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(metrics: Arc<SimMetrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);

                    let response = if request.starts_with("GET /metrics") {
                        let body = metrics.to_prometheus();
                        format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        )
                    } else if request.starts_with("GET /health") {
                        let body = "OK";
                        format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        )
                    } else {
                        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
                    };

                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}
