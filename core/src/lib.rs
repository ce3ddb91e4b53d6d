//! Relational data model shared by the retrieval strategies and the benchmark
//! harness: users, roles, authors, books and publishers, plus the immutable
//! [`Dataset`](dataset::Dataset) snapshot they are loaded into.

use log::LevelFilter;
use log4rs::{
    append::{
        console::{ConsoleAppender, Target},
        file::FileAppender,
    },
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
};

pub mod constants;
pub mod dataset;
pub mod types;

pub use dataset::{BooksCountDrift, Dataset, DatasetBuilder, DatasetError};

const LOGGING_PATTERN: &str = "{d} {l} {f}:{L} - {m}{n}";

/// Installs the global `log4rs` logger.
///
/// Records at `log_level` and above go to stderr. When `file_path` is given,
/// everything at trace level is also appended to that file.
pub fn initialize_logger(log_level: LevelFilter, file_path: Option<&str>) -> anyhow::Result<()> {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(LOGGING_PATTERN)))
        .build();

    let mut config_builder = Config::builder().appender(
        Appender::builder()
            .filter(Box::new(ThresholdFilter::new(log_level)))
            .build("stderr", Box::new(stderr)),
    );
    let mut root = Root::builder().appender("stderr");
    let mut root_level = log_level;

    if let Some(path) = file_path {
        let logfile = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(LOGGING_PATTERN)))
            .build(path)?;
        config_builder =
            config_builder.appender(Appender::builder().build("logfile", Box::new(logfile)));
        root = root.appender("logfile");
        root_level = LevelFilter::Trace;
    }

    let config = config_builder.build(root.build(root_level))?;
    log4rs::init_config(config)?;

    Ok(())
}
