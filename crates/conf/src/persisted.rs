//! This module contains configuration objects which can be deserialized from
//! a configuration file. It does not contain final configuration objects,
//! these must be built and validated from the objects here.

use serde::Deserialize;

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub(super) struct Configuration {
    pub(super) navigator: Option<Navigator>,
    pub(super) simulation: Option<Simulation>,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub(super) struct Navigator {
    pub(super) max_path_age_secs: Option<f64>,
    pub(super) max_processing_timeslice_ms: Option<f64>,
    pub(super) repair_search_depth: Option<u32>,
    pub(super) max_search_iterations: Option<usize>,
    pub(super) max_job_pool_size: Option<usize>,
    pub(super) plane_tolerance: Option<f32>,
    pub(super) offset_factor: Option<f32>,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub(super) struct Simulation {
    pub(super) grid_cols: Option<u32>,
    pub(super) grid_rows: Option<u32>,
    pub(super) cell_size: Option<f32>,
    pub(super) agents: Option<usize>,
    pub(super) frames: Option<u32>,
    pub(super) frame_time_ms: Option<f64>,
}
