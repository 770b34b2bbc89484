//! Scheduler of navigation requests.
//!
//! [`MasterNavigator`] is owned by a single thread which periodically calls
//! [`MasterNavigator::process`]. Any number of threads hold [`Navigator`]
//! handles through which they submit requests. Handles and the owner share
//! only the queues of submitted requests (guarded by a mutex); the active
//! jobs, the path cache and all search state belong to the owner.

use std::{
    mem,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use glam::Vec3;
use nm_geom::{CellId, TriCellMesh};
use nm_quadtree::TriCellQuadTree;
use tracing::{debug, info, trace, warn};

use crate::{
    astar::AStarSearch,
    cache::PathCache,
    dijkstra::{DijkstraSearch, SearchDirection},
    jobs::{JobPool, LocationJob, PathJob, RepairJob, ValidityJob},
    node::SearchState,
    path::{MasterPath, Path},
    request::NavRequest,
    settings::NavigatorSettings,
};

/// Requests submitted since the last processing.
struct Inbox {
    disposed: bool,
    paths: Vec<PathJob>,
    repairs: Vec<RepairJob>,
    locations: Vec<LocationJob>,
    validity: Vec<ValidityJob>,
    discarded: Vec<NavRequest<Path>>,
    keep_alive: Vec<u64>,
    path_pool: JobPool<AStarSearch>,
    repair_pool: JobPool<DijkstraSearch>,
}

fn lock(inbox: &Mutex<Inbox>) -> MutexGuard<'_, Inbox> {
    inbox.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Thread safe, non-blocking facade of a [`MasterNavigator`].
///
/// All methods return immediately. Requests are processed during the next
/// call(s) of [`MasterNavigator::process`]. Requests submitted after the
/// navigator was disposed fail immediately.
#[derive(Clone)]
pub struct Navigator {
    inbox: Arc<Mutex<Inbox>>,
    max_search_iterations: usize,
    cache_enabled: bool,
}

impl Navigator {
    /// Requests a path from `start` to `goal`.
    pub fn get_path(&self, start: Vec3, goal: Vec3) -> NavRequest<Path> {
        let mut inbox = lock(&self.inbox);
        if inbox.disposed {
            return NavRequest::failed();
        }

        let search = inbox
            .path_pool
            .take()
            .unwrap_or_else(|| AStarSearch::new(self.max_search_iterations));
        let request = NavRequest::new();
        inbox.paths.push(PathJob {
            request: request.clone(),
            start,
            goal,
            search,
        });
        request
    }

    /// Requests a path from `start` to the goal of `path` which reuses as
    /// much of `path` as possible.
    pub fn repair_path(&self, start: Vec3, path: &Path) -> NavRequest<Path> {
        let mut inbox = lock(&self.inbox);
        if inbox.disposed || path.is_disposed() {
            return NavRequest::failed();
        }

        let search = inbox
            .repair_pool
            .take()
            .unwrap_or_else(|| DijkstraSearch::new(self.max_search_iterations));
        let request = NavRequest::new();
        inbox.repairs.push(RepairJob {
            request: request.clone(),
            start,
            source: path.clone(),
            search,
        });
        request
    }

    /// Postpones eviction of the corridor of `path` from the path cache.
    /// Does nothing if the cache is disabled.
    pub fn keep_path_alive(&self, path: &Path) {
        if !self.cache_enabled {
            return;
        }
        let mut inbox = lock(&self.inbox);
        if inbox.disposed || path.is_disposed() {
            return;
        }
        inbox.keep_alive.push(path.master().id());
    }

    /// Cancels a path or repair request. The request fails during the next
    /// processing unless it is already finished.
    pub fn discard_path_request(&self, request: &NavRequest<Path>) {
        let mut inbox = lock(&self.inbox);
        if inbox.disposed {
            return;
        }
        inbox.discarded.push(request.clone());
    }

    /// Requests the point of the mesh nearest to `point`. Points above or
    /// below the mesh are projected vertically.
    pub fn get_nearest_valid_location(&self, point: Vec3) -> NavRequest<Vec3> {
        let mut inbox = lock(&self.inbox);
        if inbox.disposed {
            return NavRequest::failed();
        }
        let request = NavRequest::new();
        inbox.locations.push(LocationJob {
            request: request.clone(),
            point,
        });
        request
    }

    /// Requests whether `point` lies on the mesh, i.e. whether it is within
    /// `y_tolerance` above or below a cell.
    pub fn is_valid_location(&self, point: Vec3, y_tolerance: f32) -> NavRequest<bool> {
        let mut inbox = lock(&self.inbox);
        if inbox.disposed {
            return NavRequest::failed();
        }
        let request = NavRequest::new();
        inbox.validity.push(ValidityJob {
            request: request.clone(),
            point,
            y_tolerance,
        });
        request
    }

    pub fn is_disposed(&self) -> bool {
        lock(&self.inbox).disposed
    }
}

/// Owner side of the navigation: processes requests submitted via
/// [`Navigator`] handles.
pub struct MasterNavigator {
    mesh: Arc<TriCellMesh>,
    tree: TriCellQuadTree,
    settings: NavigatorSettings,
    inbox: Arc<Mutex<Inbox>>,
    path_jobs: Vec<PathJob>,
    repair_jobs: Vec<RepairJob>,
    cache: PathCache,
    next_path_id: u64,
    search_steps: u64,
    disposed: bool,
}

impl MasterNavigator {
    /// # Arguments
    ///
    /// * `tree` - quad-tree of all cells available for navigation. Paths
    ///   are searched over the mesh of the tree.
    ///
    /// * `settings` - navigator parameters.
    pub fn new(tree: TriCellQuadTree, settings: NavigatorSettings) -> Self {
        let inbox = Inbox {
            disposed: false,
            paths: Vec::new(),
            repairs: Vec::new(),
            locations: Vec::new(),
            validity: Vec::new(),
            discarded: Vec::new(),
            keep_alive: Vec::new(),
            path_pool: JobPool::new(settings.max_job_pool_size),
            repair_pool: JobPool::new(settings.repair_pool_size()),
        };

        info!(
            "Creating navigator over {} cells, cache enabled: {}",
            tree.len(),
            settings.cache_enabled()
        );
        Self {
            mesh: Arc::clone(tree.mesh()),
            tree,
            settings,
            inbox: Arc::new(Mutex::new(inbox)),
            path_jobs: Vec::new(),
            repair_jobs: Vec::new(),
            cache: PathCache::default(),
            next_path_id: 0,
            search_steps: 0,
            disposed: false,
        }
    }

    /// Returns a new handle for submission of requests.
    pub fn navigator(&self) -> Navigator {
        Navigator {
            inbox: Arc::clone(&self.inbox),
            max_search_iterations: self.settings.max_search_iterations,
            cache_enabled: self.settings.cache_enabled(),
        }
    }

    pub fn settings(&self) -> &NavigatorSettings {
        &self.settings
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Number of corridors in the path cache.
    pub fn cached_path_count(&self) -> usize {
        self.cache.len()
    }

    /// Total number of search steps performed so far.
    pub fn search_step_count(&self) -> u64 {
        self.search_steps
    }

    /// Number of path and repair jobs which are not finished.
    pub fn active_job_count(&self) -> usize {
        self.path_jobs.len() + self.repair_jobs.len()
    }

    /// Processes submitted requests.
    ///
    /// Location requests are always fully processed. Path and repair
    /// searches are advanced until they are all finished or until the
    /// processing time slice is exceeded. Each search is advanced at least
    /// once regardless of the time slice.
    ///
    /// # Arguments
    ///
    /// * `include_maintenance` - whether to update the path cache, i.e. to
    ///   apply keep alive requests and evict unused corridors.
    pub fn process(&mut self, include_maintenance: bool) {
        let budget = if self.settings.is_throttled() {
            Some(self.settings.max_processing_timeslice)
        } else {
            None
        };
        self.process_at(include_maintenance, budget, Instant::now());
    }

    /// Processes submitted requests until all of them are finished.
    pub fn process_all(&mut self, include_maintenance: bool) {
        self.process_at(include_maintenance, None, Instant::now());
    }

    fn process_at(&mut self, include_maintenance: bool, budget: Option<Duration>, now: Instant) {
        if self.disposed {
            return;
        }
        let started = Instant::now();

        let (locations, validity, discarded, keep_alive) = {
            let mut inbox = lock(&self.inbox);
            self.path_jobs.append(&mut inbox.paths);
            self.repair_jobs.append(&mut inbox.repairs);
            let keep_alive = if include_maintenance {
                mem::take(&mut inbox.keep_alive)
            } else {
                Vec::new()
            };
            (
                mem::take(&mut inbox.locations),
                mem::take(&mut inbox.validity),
                mem::take(&mut inbox.discarded),
                keep_alive,
            )
        };

        self.cancel(discarded);
        if include_maintenance {
            self.maintain(keep_alive, now);
        }

        for job in locations {
            self.resolve_location(job);
        }
        for job in validity {
            self.resolve_validity(job);
        }

        loop {
            let pending_paths = self.advance_path_jobs(now);
            let pending_repairs = self.advance_repair_jobs(now);
            if !pending_paths && !pending_repairs {
                break;
            }
            if budget.map_or(false, |budget| started.elapsed() >= budget) {
                trace!(
                    "Processing time slice exceeded with {} active jobs",
                    self.active_job_count()
                );
                break;
            }
        }
    }

    fn cancel(&mut self, discarded: Vec<NavRequest<Path>>) {
        if discarded.is_empty() {
            return;
        }

        for request in discarded.iter() {
            request.fail();
        }

        let is_discarded =
            |request: &NavRequest<Path>| discarded.iter().any(|d| d.ptr_eq(request));

        let (cancelled, remaining): (Vec<_>, Vec<_>) = mem::take(&mut self.path_jobs)
            .into_iter()
            .partition(|job| is_discarded(&job.request));
        self.path_jobs = remaining;
        let (cancelled_repairs, remaining): (Vec<_>, Vec<_>) = mem::take(&mut self.repair_jobs)
            .into_iter()
            .partition(|job| is_discarded(&job.request));
        self.repair_jobs = remaining;

        debug!(
            "Cancelled {} path and {} repair jobs",
            cancelled.len(),
            cancelled_repairs.len()
        );

        let mut inbox = lock(&self.inbox);
        for job in cancelled {
            inbox.path_pool.give(job.search);
        }
        for job in cancelled_repairs {
            inbox.repair_pool.give(job.search);
        }
    }

    fn maintain(&mut self, keep_alive: Vec<u64>, now: Instant) {
        if !self.settings.cache_enabled() {
            return;
        }

        for id in keep_alive {
            self.cache.touch(id, now);
        }
        self.cache.evict(now, self.settings.max_path_age);
    }

    fn resolve_location(&self, job: LocationJob) {
        let closest = self
            .tree
            .get_closest_cell(job.point, true)
            .or_else(|| self.tree.get_closest_cell(job.point, false));
        match closest {
            Some((_, point)) => job.request.complete(point),
            None => job.request.fail(),
        }
    }

    fn resolve_validity(&self, job: ValidityJob) {
        let point = job.point;
        let valid = self
            .tree
            .get_cells_for_point(point.x, point.z)
            .into_iter()
            .any(|id| {
                (self.mesh.cell(id).plane_y(point.x, point.z) - point.y).abs() <= job.y_tolerance
            });
        job.request.complete(valid);
    }

    /// Advances each path job once. Returns true if any job remains
    /// unfinished.
    fn advance_path_jobs(&mut self, now: Instant) -> bool {
        let mut finished = Vec::new();
        for mut job in mem::take(&mut self.path_jobs) {
            if self.advance_path_job(&mut job, now) {
                finished.push(job.search);
            } else {
                self.path_jobs.push(job);
            }
        }

        if !finished.is_empty() {
            let mut inbox = lock(&self.inbox);
            for search in finished {
                inbox.path_pool.give(search);
            }
            trace!("{} path searches pooled", inbox.path_pool.len());
        }

        !self.path_jobs.is_empty()
    }

    /// Returns true if the job is finished.
    fn advance_path_job(&mut self, job: &mut PathJob, now: Instant) -> bool {
        if job.request.is_finished() {
            return true;
        }

        if job.search.state() == SearchState::Uninitialized {
            let start = self.tree.get_closest_cell(job.start, true);
            let goal = self.tree.get_closest_cell(job.goal, true);
            let (Some((start_cell, start)), Some((goal_cell, goal))) = (start, goal) else {
                debug!(
                    "Path request from {:?} to {:?} is off the mesh",
                    job.start, job.goal
                );
                job.request.fail();
                return true;
            };

            job.start = start;
            job.goal = goal;
            job.search.initialize(start_cell, start, goal_cell, goal);

            // The cache is offered only once, before the search starts.
            if let Some(master) = self.cached_master(&job.search, now) {
                trace!("Path request served from corridor {}", master.id());
                job.request.complete(master.path(job.goal));
                return true;
            }
        }

        self.search_steps += 1;
        match job.search.process(&self.mesh) {
            SearchState::Complete => {
                let master = job
                    .search
                    .path_cells()
                    .and_then(|cells| self.create_master(cells, now));
                match master {
                    Some(master) => job.request.complete(master.path(job.goal)),
                    None => job.request.fail(),
                }
                true
            }
            SearchState::Failed => {
                debug!("No path from {:?} to {:?}", job.start, job.goal);
                job.request.fail();
                true
            }
            _ => false,
        }
    }

    /// Returns a corridor built from the path cache which connects the start
    /// and goal cells of `search`.
    fn cached_master(&mut self, search: &AStarSearch, now: Instant) -> Option<Arc<MasterPath>> {
        if !self.settings.cache_enabled() {
            return None;
        }

        let found = search.evaluate(self.cache.paths())?;
        self.cache.touch(found.path.id(), now);
        if found.is_exact() {
            Some(found.path)
        } else {
            self.create_master(found.cells().to_vec(), now)
        }
    }

    /// Advances each repair job once. Returns true if any job remains
    /// unfinished.
    fn advance_repair_jobs(&mut self, now: Instant) -> bool {
        let mut finished = Vec::new();
        for mut job in mem::take(&mut self.repair_jobs) {
            if self.advance_repair_job(&mut job, now) {
                finished.push(job.search);
            } else {
                self.repair_jobs.push(job);
            }
        }

        if !finished.is_empty() {
            let mut inbox = lock(&self.inbox);
            for search in finished {
                inbox.repair_pool.give(search);
            }
        }

        !self.repair_jobs.is_empty()
    }

    /// Returns true if the job is finished.
    fn advance_repair_job(&mut self, job: &mut RepairJob, now: Instant) -> bool {
        if job.request.is_finished() {
            return true;
        }

        let source = job.source.master();
        if !self.settings.cache_enabled()
            || source.is_disposed()
            || !self.cache.contains(source.id())
        {
            debug!("Corridor {} is not cached and cannot be repaired", source.id());
            job.request.fail();
            return true;
        }

        if job.search.state() == SearchState::Uninitialized {
            let Some((start_cell, start)) = self.tree.get_closest_cell(job.start, true) else {
                debug!("Repair request from {:?} is off the mesh", job.start);
                job.request.fail();
                return true;
            };

            job.start = start;
            job.search.initialize(
                start_cell,
                start,
                source.cells(),
                self.settings.repair_search_depth,
                SearchDirection::Forward,
            );
        }

        self.search_steps += 1;
        match job.search.process(&self.mesh) {
            SearchState::Complete => {
                let master = self.create_master(splice(&job.search, source.cells()), now);
                match master {
                    Some(master) => job.request.complete(master.path(job.source.goal())),
                    None => job.request.fail(),
                }
                true
            }
            SearchState::Failed => {
                debug!(
                    "Position {:?} cannot be reconnected to corridor {}",
                    job.start,
                    source.id()
                );
                job.request.fail();
                true
            }
            _ => false,
        }
    }

    /// Creates a new corridor and caches it if the cache is enabled.
    fn create_master(&mut self, cells: Vec<CellId>, now: Instant) -> Option<Arc<MasterPath>> {
        let id = self.next_path_id;
        self.next_path_id += 1;

        let master = match MasterPath::new(
            id,
            Arc::clone(&self.mesh),
            cells,
            self.settings.plane_tolerance,
            self.settings.offset_factor,
        ) {
            Ok(master) => Arc::new(master),
            Err(error) => {
                warn!("Invalid corridor found: {error}");
                return None;
            }
        };

        debug!(
            "Created corridor {} of {} cells",
            id,
            master.cells().len()
        );
        if self.settings.cache_enabled() {
            self.cache.insert(Arc::clone(&master), now);
        }
        Some(master)
    }

    /// Permanently disables the navigator. All unfinished requests fail and
    /// all cached corridors are disposed.
    ///
    /// Calling this more than once is harmless.
    pub fn dispose(&mut self) {
        let (paths, repairs, locations, validity) = {
            let mut inbox = lock(&self.inbox);
            inbox.disposed = true;
            inbox.discarded.clear();
            inbox.keep_alive.clear();
            inbox.path_pool.clear();
            inbox.repair_pool.clear();
            (
                mem::take(&mut inbox.paths),
                mem::take(&mut inbox.repairs),
                mem::take(&mut inbox.locations),
                mem::take(&mut inbox.validity),
            )
        };

        let failed = paths.len()
            + repairs.len()
            + locations.len()
            + validity.len()
            + self.path_jobs.len()
            + self.repair_jobs.len();

        for job in paths.into_iter().chain(self.path_jobs.drain(..)) {
            job.request.fail();
        }
        for job in repairs.into_iter().chain(self.repair_jobs.drain(..)) {
            job.request.fail();
        }
        for job in locations {
            job.request.fail();
        }
        for job in validity {
            job.request.fail();
        }
        self.cache.dispose_all();

        if !self.disposed {
            info!("Navigator disposed, {failed} unfinished requests failed");
        }
        self.disposed = true;
    }
}

impl Drop for MasterNavigator {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Joins the repair path reaching the farthest cell of `cells` with the rest
/// of `cells`. Ties are resolved in favour of the path found first.
fn splice(search: &DijkstraSearch, cells: &[CellId]) -> Vec<CellId> {
    let mut best = 0;
    for index in 1..search.path_count() {
        if search.goal_index(index) > search.goal_index(best) {
            best = index;
        }
    }

    let mut spliced = search.path_cells(best);
    spliced.extend_from_slice(&cells[search.goal_index(best) + 1..]);
    spliced
}

#[cfg(test)]
mod tests {
    use std::thread;

    use ntest::timeout;

    use super::*;
    use crate::request::NavRequestState;

    fn navigator(cols: u32, rows: u32, settings: NavigatorSettings) -> MasterNavigator {
        let mesh = Arc::new(TriCellMesh::grid(cols, rows, 1.));
        let tree = TriCellQuadTree::from_mesh(mesh, 4).unwrap();
        MasterNavigator::new(tree, settings)
    }

    fn settings() -> NavigatorSettings {
        NavigatorSettings {
            max_search_iterations: 4,
            ..NavigatorSettings::default()
        }
    }

    fn follow(path: &mut Path, start: Vec3) {
        let mut position = start;
        for _ in 0..path.cells().len() {
            position = path.get_target(position).unwrap();
            if position == path.goal() {
                return;
            }
        }
        panic!("Goal of the path was not reached.");
    }

    #[test]
    #[timeout(2000)]
    fn test_get_path() {
        let mut master = navigator(6, 6, settings());
        let navigator = master.navigator();

        let start = Vec3::new(0.7, 0.3, 0.2);
        let goal = Vec3::new(5.2, -0.2, 5.8);
        let request = navigator.get_path(start, goal);
        assert_eq!(request.state(), NavRequestState::Processing);

        master.process_all(true);
        assert_eq!(request.state(), NavRequestState::Complete);
        assert_eq!(master.active_job_count(), 0);
        assert_eq!(master.cached_path_count(), 1);

        let mut path = request.data().unwrap();
        assert_eq!(path.start_cell(), CellId::new(0));
        assert_eq!(path.goal_cell(), CellId::new(71));
        assert_eq!(path.goal(), Vec3::new(5.2, 0., 5.8));
        follow(&mut path, Vec3::new(0.7, 0., 0.2));
    }

    #[test]
    fn test_off_mesh() {
        let mut master = navigator(2, 2, settings());
        let navigator = master.navigator();
        let request = navigator.get_path(Vec3::new(0.5, 0., 0.2), Vec3::new(5., 0., 5.));
        master.process_all(true);
        assert_eq!(request.state(), NavRequestState::Failed);
        assert_eq!(master.search_step_count(), 0);
    }

    #[test]
    #[timeout(2000)]
    fn test_cache_hit() {
        let mut master = navigator(6, 6, settings());
        let navigator = master.navigator();
        let start = Vec3::new(0.7, 0., 0.2);
        let goal = Vec3::new(5.2, 0., 5.8);

        let first = navigator.get_path(start, goal);
        master.process_all(true);
        let steps = master.search_step_count();
        assert!(steps > 1);

        let second = navigator.get_path(start + Vec3::new(0.1, 0., 0.), goal);
        master.process(true);
        assert_eq!(second.state(), NavRequestState::Complete);
        assert_eq!(master.search_step_count(), steps);
        assert!(Arc::ptr_eq(
            first.data().unwrap().master(),
            second.data().unwrap().master()
        ));

        // A sub-corridor of a cached corridor is reused as well.
        let cells = first.data().unwrap().cells().to_vec();
        let inner_start = master.mesh.cell(cells[2]).centroid();
        let inner_goal = master.mesh.cell(cells[cells.len() - 3]).centroid();
        let third = navigator.get_path(inner_start, inner_goal);
        master.process(true);
        assert_eq!(third.state(), NavRequestState::Complete);
        assert_eq!(master.search_step_count(), steps);
        assert_eq!(third.data().unwrap().cells(), &cells[2..cells.len() - 2]);
        assert_eq!(master.cached_path_count(), 2);
    }

    #[test]
    #[timeout(2000)]
    fn test_cache_checked_before_search() {
        let start = Vec3::new(0.7, 0., 0.2);
        let goal = Vec3::new(5.2, 0., 5.8);

        let mut master = navigator(6, 6, settings());
        let request = master.navigator().get_path(start, goal);
        master.process_all(true);
        assert_eq!(request.state(), NavRequestState::Complete);
        let single = master.search_step_count();

        // Both searches start before any corridor is cached, thus neither is
        // served from the cache once the other one finishes.
        let mut master = navigator(6, 6, settings());
        let navigator = master.navigator();
        let first = navigator.get_path(start, goal);
        let second = navigator.get_path(start, goal);
        master.process_all(true);
        assert_eq!(first.state(), NavRequestState::Complete);
        assert_eq!(second.state(), NavRequestState::Complete);
        assert_eq!(master.search_step_count(), 2 * single);
        assert_eq!(master.cached_path_count(), 2);
    }

    #[test]
    #[timeout(2000)]
    fn test_cache_disabled() {
        let mut master = navigator(
            4,
            4,
            NavigatorSettings {
                max_path_age: Duration::ZERO,
                ..settings()
            },
        );
        let navigator = master.navigator();
        let start = Vec3::new(0.7, 0., 0.2);
        let goal = Vec3::new(3.2, 0., 3.8);

        let first = navigator.get_path(start, goal);
        master.process_all(true);
        let steps = master.search_step_count();
        let path = first.data().unwrap();
        assert_eq!(master.cached_path_count(), 0);

        let second = navigator.get_path(start, goal);
        master.process_all(true);
        assert_eq!(second.state(), NavRequestState::Complete);
        assert_eq!(master.search_step_count(), 2 * steps);

        let repair = navigator.repair_path(Vec3::new(1.5, 0., 0.2), &path);
        master.process_all(true);
        assert_eq!(repair.state(), NavRequestState::Failed);

        // Keep alive requests are not queued without a cache.
        for _ in 0..10 {
            navigator.keep_path_alive(&path);
        }
        master.process(false);
        assert!(lock(&master.inbox).keep_alive.is_empty());
    }

    #[test]
    #[timeout(2000)]
    fn test_repair() {
        let mut master = navigator(6, 6, settings());
        let navigator = master.navigator();
        let request = navigator.get_path(Vec3::new(0.7, 0., 0.2), Vec3::new(5.2, 0., 5.8));
        master.process_all(true);
        let path = request.data().unwrap();

        // A position close to the corridor but off of it.
        let new_start = (0..6)
            .flat_map(|row| (0..6).map(move |col| Vec3::new(col as f32 + 0.8, 0., row as f32 + 0.1)))
            .find(|point| !path.is_in_path_column(point.x, point.z) && {
                let neighbour = *point + Vec3::new(-1., 0., 0.);
                path.is_in_path_column(neighbour.x, neighbour.z)
            })
            .unwrap();

        let repair = navigator.repair_path(new_start, &path);
        master.process_all(true);
        assert_eq!(repair.state(), NavRequestState::Complete);

        let mut repaired = repair.data().unwrap();
        assert!(repaired.is_in_path_column(new_start.x, new_start.z));
        assert_eq!(repaired.goal_cell(), path.goal_cell());
        assert_eq!(repaired.goal(), path.goal());
        for pair in repaired.cells().windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
        follow(&mut repaired, new_start);
        assert_eq!(master.cached_path_count(), 2);
    }

    #[test]
    #[timeout(2000)]
    fn test_repair_unreachable() {
        let mut master = navigator(
            8,
            1,
            NavigatorSettings {
                repair_search_depth: 2,
                ..settings()
            },
        );
        let navigator = master.navigator();
        let request = navigator.get_path(Vec3::new(0.7, 0., 0.2), Vec3::new(2.7, 0., 0.2));
        master.process_all(true);
        let path = request.data().unwrap();

        let repair = navigator.repair_path(Vec3::new(7.5, 0., 0.2), &path);
        master.process_all(true);
        assert_eq!(repair.state(), NavRequestState::Failed);
    }

    #[test]
    #[timeout(2000)]
    fn test_eviction() {
        let mut master = navigator(4, 4, settings());
        let navigator = master.navigator();
        let max_age = master.settings().max_path_age;
        let start = Instant::now();

        let a = navigator.get_path(Vec3::new(0.7, 0., 0.2), Vec3::new(3.2, 0., 3.8));
        let b = navigator.get_path(Vec3::new(3.2, 0., 0.2), Vec3::new(0.2, 0., 3.8));
        master.process_at(false, None, start);
        let a = a.data().unwrap();
        let b = b.data().unwrap();
        assert_eq!(master.cached_path_count(), 2);

        navigator.keep_path_alive(&a);
        master.process_at(true, None, start + max_age / 2);
        assert_eq!(master.cached_path_count(), 2);

        master.process_at(true, None, start + max_age + Duration::from_millis(1));
        assert_eq!(master.cached_path_count(), 1);
        assert!(b.is_disposed());
        assert!(!a.is_disposed());

        // Evicted corridors can be neither repaired nor kept alive.
        assert_eq!(
            navigator.repair_path(Vec3::new(0.7, 0., 0.2), &b).state(),
            NavRequestState::Failed
        );

        master.process_at(true, None, start + max_age / 2 + max_age);
        assert_eq!(master.cached_path_count(), 1);
        master.process_at(
            true,
            None,
            start + max_age / 2 + max_age + Duration::from_millis(1),
        );
        assert_eq!(master.cached_path_count(), 0);
        assert!(a.is_disposed());
    }

    #[test]
    fn test_locations() {
        let mut master = navigator(
            4,
            4,
            NavigatorSettings {
                max_processing_timeslice: Duration::ZERO,
                ..settings()
            },
        );
        let navigator = master.navigator();

        let above = navigator.get_nearest_valid_location(Vec3::new(1.5, 3., 2.5));
        let outside = navigator.get_nearest_valid_location(Vec3::new(6., 1., 2.));
        let valid = navigator.is_valid_location(Vec3::new(1.5, 0., 2.5), 0.);
        let high = navigator.is_valid_location(Vec3::new(1.5, 1., 2.5), 0.5);
        let out_of_column = navigator.is_valid_location(Vec3::new(-1., 0., 2.5), 0.);
        // Path jobs do not delay location jobs.
        let _path = navigator.get_path(Vec3::new(0.7, 0., 0.2), Vec3::new(3.2, 0., 3.8));
        master.process(false);

        assert_eq!(above.data(), Some(Vec3::new(1.5, 0., 2.5)));
        let outside = outside.data().unwrap();
        assert!((outside.x - 4.).abs() < 0.001);
        assert!((outside.z - 2.).abs() < 0.001);
        assert_eq!(valid.data(), Some(true));
        assert_eq!(high.data(), Some(false));
        assert_eq!(out_of_column.state(), NavRequestState::Complete);
        assert_eq!(out_of_column.data(), Some(false));
    }

    #[test]
    #[timeout(5000)]
    fn test_time_slice() {
        let mut master = navigator(
            10,
            10,
            NavigatorSettings {
                max_path_age: Duration::ZERO,
                max_processing_timeslice: Duration::from_nanos(1),
                max_search_iterations: 1,
                ..settings()
            },
        );
        let navigator = master.navigator();

        let requests: Vec<_> = (0..10)
            .map(|i| {
                navigator.get_path(
                    Vec3::new(0.7, 0., 0.2),
                    Vec3::new(9.2, 0., i as f32 + 0.8),
                )
            })
            .collect();

        master.process(false);
        assert_eq!(master.search_step_count(), 10);
        assert!(requests
            .iter()
            .all(|r| r.state() == NavRequestState::Processing));

        master.process_all(false);
        assert!(requests
            .iter()
            .all(|r| r.state() == NavRequestState::Complete));
        assert_eq!(master.active_job_count(), 0);
    }

    #[test]
    fn test_discard() {
        let mut master = navigator(4, 4, settings());
        let navigator = master.navigator();
        let start = Vec3::new(0.7, 0., 0.2);
        let goal = Vec3::new(3.2, 0., 3.8);

        let kept = navigator.get_path(start, goal);
        master.process_all(false);
        let discarded = navigator.get_path(start, goal + Vec3::new(-0.1, 0., 0.));
        navigator.discard_path_request(&discarded);
        navigator.discard_path_request(&kept);
        master.process_all(false);

        assert_eq!(discarded.state(), NavRequestState::Failed);
        assert!(discarded.data().is_none());
        assert_eq!(kept.state(), NavRequestState::Complete);
        assert_eq!(master.active_job_count(), 0);

        // Discarded during a search.
        let mut master = navigator_with_slow_search();
        let navigator = master.navigator();
        let request = navigator.get_path(Vec3::new(0.7, 0., 0.2), Vec3::new(9.2, 0., 9.8));
        master.process(false);
        assert_eq!(master.active_job_count(), 1);
        navigator.discard_path_request(&request);
        master.process(false);
        assert_eq!(request.state(), NavRequestState::Failed);
        assert_eq!(master.active_job_count(), 0);
    }

    fn navigator_with_slow_search() -> MasterNavigator {
        navigator(
            10,
            10,
            NavigatorSettings {
                max_processing_timeslice: Duration::ZERO,
                max_search_iterations: 1,
                ..settings()
            },
        )
    }

    #[test]
    fn test_dispose() {
        let mut master = navigator_with_slow_search();
        let navigator = master.navigator();

        let first = navigator.get_path(Vec3::new(0.7, 0., 0.2), Vec3::new(1.2, 0., 0.8));
        master.process_all(true);
        let path = first.data().unwrap();
        let active = navigator.get_path(Vec3::new(0.7, 0., 0.2), Vec3::new(9.2, 0., 9.8));
        master.process(false);
        let queued = navigator.is_valid_location(Vec3::ZERO, 0.);

        master.dispose();
        assert!(master.is_disposed());
        assert!(navigator.is_disposed());
        assert_eq!(active.state(), NavRequestState::Failed);
        assert_eq!(queued.state(), NavRequestState::Failed);
        assert_eq!(first.state(), NavRequestState::Complete);
        assert!(path.is_disposed());
        assert_eq!(master.cached_path_count(), 0);

        assert_eq!(
            navigator.get_path(Vec3::ZERO, Vec3::ONE).state(),
            NavRequestState::Failed
        );
        assert_eq!(
            navigator.repair_path(Vec3::ZERO, &path).state(),
            NavRequestState::Failed
        );
        assert_eq!(
            navigator.get_nearest_valid_location(Vec3::ZERO).state(),
            NavRequestState::Failed
        );
        assert_eq!(
            navigator.is_valid_location(Vec3::ZERO, 1.).state(),
            NavRequestState::Failed
        );

        master.process(true);
        master.dispose();
    }

    #[test]
    #[timeout(10000)]
    fn test_clients() {
        let mut master = navigator(8, 8, settings());
        let clients: Vec<_> = (0..4)
            .map(|i| {
                let navigator = master.navigator();
                thread::spawn(move || {
                    let offset = i as f32;
                    let requests: Vec<_> = (0..5)
                        .map(|j| {
                            navigator.get_path(
                                Vec3::new(offset + 0.7, 0., 0.2),
                                Vec3::new(7.2, 0., j as f32 + 2.8),
                            )
                        })
                        .collect();
                    while !requests.iter().all(|r| r.is_finished()) {
                        thread::yield_now();
                    }
                    requests
                        .iter()
                        .all(|r| r.state() == NavRequestState::Complete)
                })
            })
            .collect();

        while !clients.iter().all(|c| c.is_finished()) {
            master.process(true);
            thread::yield_now();
        }
        for client in clients {
            assert!(client.join().unwrap());
        }
    }
}
