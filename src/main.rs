use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use hole_royale_sim::config::{RunnerConfig, SimConfig};
use hole_royale_sim::game::game_loop::GameLoop;
use hole_royale_sim::game::input_buffer::{InputSender, PlayerInput};
use hole_royale_sim::game::performance::PerformanceMonitor;
use hole_royale_sim::game::state::ObjectSpec;
use hole_royale_sim::game::world;
use hole_royale_sim::metrics::{self, SimMetrics};
use hole_royale_sim::util::vec2::Vec2;

/// Headless round runner
struct Runner {
    game: GameLoop,
    performance: PerformanceMonitor,
    metrics: Arc<SimMetrics>,
    player: DemoPlayer,
    status_every: u64,
}

impl Runner {
    fn step(&mut self) {
        self.player.drive(&self.game);

        self.performance.tick_start();
        let events = self.game.tick().to_vec();
        let entities = self.game.store().hole_count() + self.game.index().len();
        if let Some(duration) = self.performance.tick_end(entities) {
            self.metrics.record_tick_time(duration);
        }

        self.metrics.observe_events(&events);
        self.metrics.observe_round(
            self.game.round(),
            self.game.store().hole_count(),
            self.game.store().objects().iter().filter(|o| o.is_idle()).count(),
        );
        self.metrics.observe_performance(&self.performance);

        if self.game.tick_count() % self.status_every == 0 {
            self.log_status();
        }
    }

    fn log_status(&self) {
        let round = self.game.round();
        let leader = round
            .leaderboard
            .leader()
            .map_or_else(|| "-".to_string(), |e| format!("{} r={:.1}", e.name, e.radius));
        info!(
            "t={:.0}s alive={} consumed={:.1}% leader={} | {}",
            round.elapsed_time,
            round.alive_count,
            round.percent_city_consumed,
            leader,
            self.performance.status_message()
        );
        if !self.performance.status().keeps_up() {
            warn!("Simulation is falling behind real time");
        }
    }
}

/// Stand-in for a human: slowly turning heading with a dash every few seconds
struct DemoPlayer {
    sender: InputSender,
    heading: f32,
    ticks: u64,
}

impl DemoPlayer {
    fn drive(&mut self, game: &GameLoop) {
        self.ticks += 1;
        self.heading += 0.01;
        let input = PlayerInput {
            direction: Vec2::from_angle(self.heading),
            dash: self.ticks % (game.config().tick_rate as u64 * 4) == 0,
        };
        if let Err(e) = self.sender.try_send(game.player_id(), input) {
            warn!("Dropped demo input: {}", e);
        }
    }
}

fn load_objects(runner: &RunnerConfig, config: &SimConfig) -> anyhow::Result<Vec<ObjectSpec>> {
    match &runner.objects_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).with_context(|| format!("reading object list {}", path))?;
            let objects: Vec<ObjectSpec> =
                serde_json::from_str(&raw).with_context(|| format!("parsing object list {}", path))?;
            info!("Loaded {} objects from {}", objects.len(), path);
            Ok(objects)
        }
        None => {
            info!("No OBJECTS_PATH set, scattering {} fixture objects", runner.fixture_objects);
            Ok(world::scatter_fixture(
                runner.fixture_objects,
                config.world_width,
                config.world_height,
                config.seed,
            ))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Hole Royale simulation v{}", env!("CARGO_PKG_VERSION"));

    let config = SimConfig::load_or_default();
    config.validate().context("invalid round configuration")?;
    let runner_config = RunnerConfig::load_or_default();
    info!(
        "Configuration loaded: mode={}, bots={}, time_limit={}s, seed={:#x}, realtime={}",
        config.mode, config.bot_count, config.time_limit, config.seed, runner_config.realtime
    );

    let objects = load_objects(&runner_config, &config)?;
    let game = GameLoop::new(config.clone(), &objects)?;

    let metrics = Arc::new(SimMetrics::new());
    if let Some(port) = runner_config.metrics_port {
        let metrics_clone = metrics.clone();
        tokio::spawn(async move {
            if let Err(e) = metrics::start_metrics_server(metrics_clone, port).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    let status_every = ((runner_config.status_interval * config.tick_rate as f32).round() as u64).max(1);
    let mut runner = Runner {
        player: DemoPlayer {
            sender: game.input_sender(),
            heading: 0.0,
            ticks: 0,
        },
        game,
        performance: PerformanceMonitor::new(config.tick_rate),
        metrics,
        status_every,
    };

    if runner_config.realtime {
        let mut ticker = interval(Duration::from_secs_f32(config.dt()));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        while !runner.game.is_over() {
            tokio::select! {
                _ = ticker.tick() => runner.step(),
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }
    } else {
        while !runner.game.is_over() {
            runner.step();
        }
    }

    match runner.game.result() {
        Some(result) => {
            info!(
                "Round over ({:?}) after {:.1}s: winner={}, eliminations={}, consumed={:.1}%",
                result.end_reason,
                result.duration,
                result.winner_name.as_deref().unwrap_or("none"),
                result.total_eliminations,
                result.percent_city_consumed
            );
            for ranking in result.rankings.iter().take(5) {
                info!(
                    "  #{} {} area={:.0} score={:.0} captured={} eliminations={}",
                    ranking.rank,
                    ranking.name,
                    ranking.final_area,
                    ranking.score,
                    ranking.objects_captured,
                    ranking.eliminations
                );
            }
        }
        None => info!("Round interrupted at tick {}", runner.game.tick_count()),
    }

    if let Some(path) = &runner_config.snapshot_out {
        let json = serde_json::to_string_pretty(&runner.game.snapshot())?;
        std::fs::write(path, json).with_context(|| format!("writing snapshot to {}", path))?;
        info!("Final snapshot written to {}", path);
    }

    Ok(())
}
