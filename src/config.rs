use std::time::Duration;

// Tunables for a `Store`. Constructed in Rust by the caller; there is
// no file- or environment-based loader.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    // Active segment size, in bytes, at or above which the rotation
    // worker seals it and opens a fresh one.
    pub max_segment_size: u32,
    // How often the rotation worker checks the active segment's size.
    pub rotation_period: Duration,
    // How often the merge worker rewrites the log.
    pub merge_period: Duration,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            max_segment_size: 200 * 1024 * 1024,
            rotation_period: Duration::from_secs(5 * 60),
            merge_period: Duration::from_secs(60 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_two_hundred_mib_five_min_one_hour() {
        let config = Config::default();
        assert_eq!(config.max_segment_size, 200 * 1024 * 1024);
        assert_eq!(config.rotation_period, Duration::from_secs(300));
        assert_eq!(config.merge_period, Duration::from_secs(3600));
    }
}
