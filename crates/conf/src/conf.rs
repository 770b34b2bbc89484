//! This module implements final (i.e. parsed and validated) configuration
//! objects and their building from persistent configuration.

use std::time::Duration;

use anyhow::{ensure, Context, Error, Result};
use nm_pathing::{NavigatorSettings, MAX_OFFSET_FACTOR};

use crate::persisted;

#[derive(Clone, Debug, Default)]
pub struct Configuration {
    navigator: NavigatorConf,
    simulation: SimulationConf,
}

impl Configuration {
    pub fn navigator(&self) -> &NavigatorConf {
        &self.navigator
    }

    pub fn simulation(&self) -> &SimulationConf {
        &self.simulation
    }
}

impl TryFrom<persisted::Configuration> for Configuration {
    type Error = Error;

    fn try_from(persisted: persisted::Configuration) -> Result<Self> {
        Ok(Self {
            navigator: persisted
                .navigator
                .unwrap_or_default()
                .try_into()
                .context("Invalid `navigator` configuration")?,
            simulation: persisted
                .simulation
                .unwrap_or_default()
                .try_into()
                .context("Invalid `simulation` configuration")?,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct NavigatorConf {
    settings: NavigatorSettings,
}

impl NavigatorConf {
    /// Settings of the navigator built from this configuration.
    pub fn settings(&self) -> &NavigatorSettings {
        &self.settings
    }

    /// Whether path caching, sharing and repairs are enabled.
    pub fn cache_enabled(&self) -> bool {
        self.settings.cache_enabled()
    }
}

impl TryFrom<persisted::Navigator> for NavigatorConf {
    type Error = Error;

    fn try_from(persisted: persisted::Navigator) -> Result<Self> {
        let mut settings = NavigatorSettings::default();

        if let Some(secs) = persisted.max_path_age_secs {
            ensure!(
                secs.is_finite() && secs >= 0.,
                "`max_path_age_secs` must be a finite non-negative number, got {secs}."
            );
            settings.max_path_age = Duration::try_from_secs_f64(secs)
                .context("`max_path_age_secs` is out of range")?;
        }

        if let Some(millis) = persisted.max_processing_timeslice_ms {
            ensure!(
                millis >= 0.,
                "`max_processing_timeslice_ms` must be non-negative, got {millis}."
            );
            settings.max_processing_timeslice = if millis.is_infinite() {
                Duration::MAX
            } else {
                Duration::try_from_secs_f64(millis / 1000.)
                    .context("`max_processing_timeslice_ms` is out of range")?
            };
        }

        if let Some(depth) = persisted.repair_search_depth {
            ensure!(depth >= 1, "`repair_search_depth` must be at least 1.");
            settings.repair_search_depth = depth;
        }

        if let Some(iterations) = persisted.max_search_iterations {
            ensure!(iterations >= 1, "`max_search_iterations` must be at least 1.");
            settings.max_search_iterations = iterations;
        }

        if let Some(size) = persisted.max_job_pool_size {
            settings.max_job_pool_size = size;
        }

        if let Some(tolerance) = persisted.plane_tolerance {
            ensure!(
                tolerance.is_finite() && tolerance >= 0.,
                "`plane_tolerance` must be a finite non-negative number, got {tolerance}."
            );
            settings.plane_tolerance = tolerance;
        }

        if let Some(factor) = persisted.offset_factor {
            ensure!(
                (0. ..=MAX_OFFSET_FACTOR).contains(&factor),
                "`offset_factor` must be between 0 and {MAX_OFFSET_FACTOR}, got {factor}."
            );
            settings.offset_factor = factor;
        }

        Ok(Self { settings })
    }
}

#[derive(Clone, Debug)]
pub struct SimulationConf {
    grid_cols: u32,
    grid_rows: u32,
    cell_size: f32,
    agents: usize,
    frames: u32,
    frame_time: Duration,
}

impl SimulationConf {
    /// Number of grid squares along the x axis.
    pub fn grid_cols(&self) -> u32 {
        self.grid_cols
    }

    /// Number of grid squares along the z axis.
    pub fn grid_rows(&self) -> u32 {
        self.grid_rows
    }

    /// Length of the side of a single grid square.
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Number of simulated agents.
    pub fn agents(&self) -> usize {
        self.agents
    }

    /// Number of simulated frames.
    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Target duration of a single simulated frame.
    pub fn frame_time(&self) -> Duration {
        self.frame_time
    }
}

impl Default for SimulationConf {
    fn default() -> Self {
        Self {
            grid_cols: 32,
            grid_rows: 32,
            cell_size: 1.,
            agents: 16,
            frames: 600,
            frame_time: Duration::from_millis(16),
        }
    }
}

impl TryFrom<persisted::Simulation> for SimulationConf {
    type Error = Error;

    fn try_from(persisted: persisted::Simulation) -> Result<Self> {
        let defaults = Self::default();

        let grid_cols = persisted.grid_cols.unwrap_or(defaults.grid_cols);
        ensure!(grid_cols > 0, "`grid_cols` must be positive.");
        let grid_rows = persisted.grid_rows.unwrap_or(defaults.grid_rows);
        ensure!(grid_rows > 0, "`grid_rows` must be positive.");

        let cell_size = persisted.cell_size.unwrap_or(defaults.cell_size);
        ensure!(
            cell_size.is_finite() && cell_size > 0.,
            "`cell_size` must be a finite positive number, got {cell_size}."
        );

        let frame_time = match persisted.frame_time_ms {
            Some(millis) => {
                ensure!(
                    millis.is_finite() && millis >= 0.,
                    "`frame_time_ms` must be a finite non-negative number, got {millis}."
                );
                Duration::try_from_secs_f64(millis / 1000.)
                    .context("`frame_time_ms` is out of range")?
            }
            None => defaults.frame_time,
        };

        Ok(Self {
            grid_cols,
            grid_rows,
            cell_size,
            agents: persisted.agents.unwrap_or(defaults.agents),
            frames: persisted.frames.unwrap_or(defaults.frames),
            frame_time,
        })
    }
}
