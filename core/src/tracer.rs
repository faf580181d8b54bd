use std::io::stderr;

use clap::ValueEnum;
use tracing_subscriber::{
    filter::ParseError,
    fmt::layer,
    layer::SubscriberExt,
    registry,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

// Types

pub type Result<T = ()> = std::result::Result<T, Error>;

// Error

#[derive(Debug, thiserror::Error)]
#[error("failed to initialize tracer: {0}")]
pub enum Error {
    Init(
        #[from]
        #[source]
        TryInitError,
    ),
    Filter(
        #[from]
        #[source]
        ParseError,
    ),
}

// LogFormat

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum LogFormat {
    Json,
    #[default]
    Text,
}

// Functions

pub fn init_tracer<FILTER: Into<String>>(log_filter: FILTER, format: LogFormat) -> Result {
    let filter = EnvFilter::builder().parse(log_filter.into())?;
    let registry = registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(layer().json().with_writer(stderr))
            .try_init()?,
        LogFormat::Text => registry.with(layer().with_writer(stderr)).try_init()?,
    }
    Ok(())
}

// Tests
