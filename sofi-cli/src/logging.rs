//! Logger bootstrap mapping `--debug-level` onto the `log` facade.

use log::LevelFilter;

pub fn init(debug_level: u8) {
    let level = match debug_level {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp_micros()
        .init();
}
