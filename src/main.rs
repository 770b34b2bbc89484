//! Headless simulation of agents navigating a grid mesh. Agents run in their
//! own threads and talk to the navigator only through request handles while
//! the main thread processes the requests frame by frame.

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::Parser;
use glam::Vec3;
use nm_conf::Configuration;
use nm_geom::TriCellMesh;
use nm_pathing::{MasterNavigator, NavRequest, NavRequestState, Navigator, Path};
use nm_quadtree::TriCellQuadTree;
use tracing::{debug, info, warn};

const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
const GIT_SHA: &str = env!("NMPATH_GIT_SHA");
const TREE_DEPTH: u32 = 8;
/// Distance an agent moves per step.
const AGENT_SPEED: f32 = 0.25;
/// Maximum number of steps an agent spends on a single path.
const MAX_STEPS: u32 = 2000;
/// Chance that an agent gets pushed away from its corridor during a step.
const PUSH_CHANCE: f32 = 0.01;

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to a YAML configuration file. Defaults are used if it does not
    /// exist.
    #[arg(long, default_value = "nmsim.yaml")]
    conf: PathBuf,
    /// Overrides the number of simulated frames.
    #[arg(long)]
    frames: Option<u32>,
    /// Overrides the number of simulated agents.
    #[arg(long)]
    agents: Option<usize>,
    /// Directory where log files are written.
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
    /// Seed of the random generator of the agents.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Default)]
struct Stats {
    paths: AtomicU64,
    failed_paths: AtomicU64,
    repairs: AtomicU64,
    failed_repairs: AtomicU64,
    arrivals: AtomicU64,
    invalid_goals: AtomicU64,
}

impl Stats {
    fn add(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_guard = nm_log::init(args.log_dir.as_path()).context("Failed to initialize logging")?;

    info!(
        "Starting nmsim {{ \"Version\": \"{}\", \"GitSha\": \"{}\", \"Log\": \"{}\" }}",
        CARGO_PKG_VERSION,
        GIT_SHA.trim(),
        log_guard.path().display()
    );

    let conf = async_std::task::block_on(nm_conf::load_conf(
        async_std::path::Path::new(&args.conf),
    ))?;
    run(&conf, &args)
}

fn run(conf: &Configuration, args: &Args) -> Result<()> {
    let simulation = conf.simulation();
    let frames = args.frames.unwrap_or(simulation.frames());
    let agents = args.agents.unwrap_or(simulation.agents());

    let mesh = Arc::new(TriCellMesh::grid(
        simulation.grid_cols(),
        simulation.grid_rows(),
        simulation.cell_size(),
    ));
    let settings = conf.navigator().settings().clone();
    let tree = TriCellQuadTree::from_mesh(Arc::clone(&mesh), TREE_DEPTH)
        .context("Failed to build the cell index")?
        .with_plane_tolerance(settings.plane_tolerance);
    info!(
        "Mesh of {} cells ready, cache enabled: {}, throttled: {}",
        mesh.len(),
        settings.cache_enabled(),
        settings.is_throttled()
    );

    let mut master = MasterNavigator::new(tree, settings);
    let extent = Vec3::new(
        simulation.grid_cols() as f32 * simulation.cell_size(),
        0.,
        simulation.grid_rows() as f32 * simulation.cell_size(),
    );

    let stop = Arc::new(AtomicBool::new(false));
    let stats = Arc::new(Stats::default());
    let handles: Vec<_> = (0..agents)
        .map(|index| {
            let agent = Agent {
                navigator: master.navigator(),
                rng: fastrand::Rng::with_seed(args.seed.wrapping_add(index as u64)),
                extent,
                stop: Arc::clone(&stop),
                stats: Arc::clone(&stats),
                poll: simulation.frame_time() / 4,
            };
            thread::Builder::new()
                .name(format!("agent-{index}"))
                .spawn(move || agent.run())
                .context("Failed to spawn an agent thread")
        })
        .collect::<Result<_>>()?;

    let started = Instant::now();
    for frame in 0..frames {
        let frame_start = Instant::now();
        master.process(true);
        if frame % 100 == 0 {
            debug!(
                "Frame {frame}: {} jobs active, {} corridors cached",
                master.active_job_count(),
                master.cached_path_count()
            );
        }
        if let Some(rest) = simulation.frame_time().checked_sub(frame_start.elapsed()) {
            thread::sleep(rest);
        }
    }

    stop.store(true, Ordering::Relaxed);
    master.dispose();
    for handle in handles {
        if handle.join().is_err() {
            warn!("An agent thread panicked");
        }
    }

    info!(
        "Simulated {frames} frames with {agents} agents in {:.2?}: \
         {} paths ({} failed), {} repairs ({} failed), {} arrivals, \
         {} invalid goals, {} search steps",
        started.elapsed(),
        stats.paths.load(Ordering::Relaxed),
        stats.failed_paths.load(Ordering::Relaxed),
        stats.repairs.load(Ordering::Relaxed),
        stats.failed_repairs.load(Ordering::Relaxed),
        stats.arrivals.load(Ordering::Relaxed),
        stats.invalid_goals.load(Ordering::Relaxed),
        master.search_step_count(),
    );
    Ok(())
}

struct Agent {
    navigator: Navigator,
    rng: fastrand::Rng,
    extent: Vec3,
    stop: Arc<AtomicBool>,
    stats: Arc<Stats>,
    poll: Duration,
}

impl Agent {
    fn run(mut self) {
        let spawn = self.random_point();
        let Some(mut position) = self.wait(self.navigator.get_nearest_valid_location(spawn)) else {
            return;
        };

        while !self.stopped() {
            let goal = self.random_point();
            match self.wait(self.navigator.is_valid_location(goal, 0.5)) {
                Some(true) => (),
                Some(false) => {
                    Stats::add(&self.stats.invalid_goals);
                    continue;
                }
                None => return,
            }

            let request = self.navigator.get_path(position, goal);
            let Some(path) = self.wait_path(request) else {
                Stats::add(&self.stats.failed_paths);
                continue;
            };
            Stats::add(&self.stats.paths);

            match self.follow(path, position) {
                Some(end) => position = end,
                None => return,
            }
        }
    }

    /// Walks along `path` and returns the final position, or None if the
    /// simulation stopped.
    fn follow(&mut self, mut path: Path, mut position: Vec3) -> Option<Vec3> {
        for _ in 0..MAX_STEPS {
            if self.stopped() {
                return None;
            }

            let Some(target) = path.get_target(position) else {
                // Off the corridor: reconnect to it.
                let request = self.navigator.repair_path(position, &path);
                match self.wait_path(request) {
                    Some(repaired) => {
                        Stats::add(&self.stats.repairs);
                        path = repaired;
                        continue;
                    }
                    None => {
                        Stats::add(&self.stats.failed_repairs);
                        return Some(position);
                    }
                }
            };

            let offset = target - position;
            let distance = offset.length();
            if distance <= AGENT_SPEED {
                position = target;
                if position == path.goal() {
                    Stats::add(&self.stats.arrivals);
                    return Some(position);
                }
            } else {
                position += offset * (AGENT_SPEED / distance);
            }
            position = path.force_to_path(position);

            if self.rng.f32() < PUSH_CHANCE {
                position = self.push(position);
            }
            self.navigator.keep_path_alive(&path);
        }
        Some(position)
    }

    fn push(&mut self, position: Vec3) -> Vec3 {
        let pushed = position
            + Vec3::new(
                2. * self.rng.f32() - 1.,
                0.,
                2. * self.rng.f32() - 1.,
            );
        pushed.clamp(Vec3::ZERO, self.extent)
    }

    fn random_point(&mut self) -> Vec3 {
        Vec3::new(
            self.extent.x * self.rng.f32(),
            0.,
            self.extent.z * self.rng.f32(),
        )
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    fn wait_path(&self, request: NavRequest<Path>) -> Option<Path> {
        let path = self.wait(request.clone());
        if path.is_none() && !request.is_finished() {
            self.navigator.discard_path_request(&request);
        }
        path
    }

    /// Blocks until `request` is finished. Returns None if it failed or if
    /// the simulation stopped in the meantime.
    fn wait<T: Clone>(&self, request: NavRequest<T>) -> Option<T> {
        loop {
            match request.state() {
                NavRequestState::Complete => return request.data(),
                NavRequestState::Failed => return None,
                NavRequestState::Processing => {
                    if self.stopped() {
                        return None;
                    }
                    thread::sleep(self.poll);
                }
            }
        }
    }
}
