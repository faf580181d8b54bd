use std::{
    fs::{create_dir_all, File},
    path::PathBuf,
};

use clap::Parser;
use kube::CustomResourceExt;
use sledge_core::{
    tracer::{init_tracer, LogFormat},
    CloudSqlInstance,
};
use tracing::{debug, info};

// Main

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracer(args.log_filter, LogFormat::Text)?;
    debug!("creating output directory");
    create_dir_all(&args.output)?;
    let path = args.output.join("cloud-sql-instance").with_extension("yaml");
    debug!(path = %path.display(), "dumping yaml-formatted crd to file");
    let mut file = File::create(&path)?;
    serde_yaml::to_writer(&mut file, &CloudSqlInstance::crd())?;
    info!(path = %path.display(), "crd written");
    Ok(())
}

// Args

#[derive(Clone, Debug, Eq, Parser, PartialEq)]
struct Args {
    #[arg(
        long,
        env,
        default_value = "crds=info,warn",
        long_help = "Log filter (https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html#directives)"
    )]
    log_filter: String,
    #[arg(help = "Path to directory into write CRD file")]
    output: PathBuf,
}
