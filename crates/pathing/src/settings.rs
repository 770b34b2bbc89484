use std::time::Duration;

/// Parameters of a [`crate::MasterNavigator`].
#[derive(Clone, Debug, PartialEq)]
pub struct NavigatorSettings {
    /// Cached corridors not used for longer than this are evicted. Zero
    /// disables the cache together with corridor sharing and repairs.
    pub max_path_age: Duration,
    /// Soft wall-clock budget of the iterative part of a single processing
    /// call. [`Duration::MAX`] lets every job run to completion.
    pub max_processing_timeslice: Duration,
    /// Maximum number of cells of a corridor reconnecting an agent to an
    /// existing corridor.
    pub repair_search_depth: u32,
    /// Maximum number of search nodes expanded by a single job step.
    pub max_search_iterations: usize,
    /// Capacity of the pool of reusable path jobs. The pool of repair jobs
    /// is a third of it (or equal to it when smaller than 3).
    pub max_job_pool_size: usize,
    /// Maximum height difference between a point and a cell plane for the
    /// point to be considered on the cell.
    pub plane_tolerance: f32,
    /// See [`crate::MasterPath::new`].
    pub offset_factor: f32,
}

impl NavigatorSettings {
    /// Returns true if corridors are cached, shared and repairable.
    pub fn cache_enabled(&self) -> bool {
        !self.max_path_age.is_zero()
    }

    /// Returns true if the processing time budget is limited.
    pub fn is_throttled(&self) -> bool {
        self.max_processing_timeslice != Duration::MAX
    }

    pub(crate) fn repair_pool_size(&self) -> usize {
        if self.max_job_pool_size < 3 {
            self.max_job_pool_size
        } else {
            self.max_job_pool_size / 3
        }
    }
}

impl Default for NavigatorSettings {
    fn default() -> Self {
        Self {
            max_path_age: Duration::from_secs(60),
            max_processing_timeslice: Duration::from_millis(2),
            repair_search_depth: 8,
            max_search_iterations: 50,
            max_job_pool_size: 30,
            plane_tolerance: 0.5,
            offset_factor: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_sizes() {
        let mut settings = NavigatorSettings::default();
        assert_eq!(settings.repair_pool_size(), 10);
        settings.max_job_pool_size = 2;
        assert_eq!(settings.repair_pool_size(), 2);
        settings.max_job_pool_size = 3;
        assert_eq!(settings.repair_pool_size(), 1);
    }

    #[test]
    fn test_flags() {
        let mut settings = NavigatorSettings::default();
        assert!(settings.cache_enabled());
        assert!(settings.is_throttled());
        settings.max_path_age = Duration::ZERO;
        settings.max_processing_timeslice = Duration::MAX;
        assert!(!settings.cache_enabled());
        assert!(!settings.is_throttled());
    }
}
