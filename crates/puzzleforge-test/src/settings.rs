//! Generator settings for tests.

use puzzleforge_config::GeneratorConfig;

/// Settings with a fixed seed and a short solver time limit.
pub fn seeded(seed: u64) -> GeneratorConfig {
    GeneratorConfig::new()
        .with_random_seed(seed)
        .with_time_limit_ms(5_000)
        .with_max_regenerations(50)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_settings_validate() {
        let config = seeded(3);
        assert_eq!(config.random_seed, Some(3));
        assert!(config.validate().is_ok());
    }
}
