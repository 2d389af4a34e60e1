//! Stand-in used when the `logging` feature is disabled. Nothing is printed, but the level
//! filters still reach the `log` facade so the macros stay cheap.

use log::LevelFilter;

use crate::log::LogConfiguration;

impl LogConfiguration {
    pub(in crate::log) fn set_config(&mut self) {
        let module_max = self
            .module_configurations
            .values()
            .map(|module_config| module_config.level)
            .max()
            .unwrap_or(LevelFilter::Off);
        log::set_max_level(self.global_log_level.max(module_max));
    }
}
