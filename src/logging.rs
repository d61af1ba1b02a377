use env_logger::{Builder, Env};
use log::LevelFilter;

/// Environment variable that, if set, overrides the verbosity given on the command line.
const LOG_ENV_VAR: &str = "HUBLAG_LOG";

/// Initialize `env_logger`, given the verbosity level from the CLI.
///
/// # Arguments
///
/// * `verbosity_level` - `0` is `INFO`: positive values increase verbosity, negative decrease it
pub fn init(verbosity_level: i8) {
    let default_level = level_filter_for(verbosity_level);

    Builder::new()
        .filter_level(default_level)
        .format_timestamp_millis()
        .parse_env(Env::new().filter(LOG_ENV_VAR))
        .init();

    debug!("Logging initialized at '{default_level}' (override with '{LOG_ENV_VAR}')");
}

fn level_filter_for(verbosity_level: i8) -> LevelFilter {
    match verbosity_level {
        i8::MIN..=-3 => LevelFilter::Off,
        -2 => LevelFilter::Error,
        -1 => LevelFilter::Warn,
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        2..=i8::MAX => LevelFilter::Trace,
    }
}

#[cfg(test)]
mod test {
    use log::LevelFilter;

    use super::level_filter_for;

    #[test]
    fn verbosity_maps_to_level() {
        assert_eq!(level_filter_for(0), LevelFilter::Info);
        assert_eq!(level_filter_for(1), LevelFilter::Debug);
        assert_eq!(level_filter_for(5), LevelFilter::Trace);
        assert_eq!(level_filter_for(-1), LevelFilter::Warn);
        assert_eq!(level_filter_for(-2), LevelFilter::Error);
        assert_eq!(level_filter_for(-3), LevelFilter::Off);
        assert_eq!(level_filter_for(i8::MIN), LevelFilter::Off);
    }
}
