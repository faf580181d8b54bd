use std::future::Future;

use tokio::process::Command;
use tracing::{debug, instrument};

use crate::err::{Error, Result};

// Macros

macro_rules! log_output {
    ($log:ident, $lvl:ident, $output:expr) => {
        if tracing::enabled!(tracing::Level::$lvl) {
            for line in $output.lines() {
                tracing::$log!(output = "combined", "{line}");
            }
        }
    };
}

// Traits

#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner: Send + Sync {
    /// Runs the command and returns its combined output (stdout then stderr).
    ///
    /// The child is killed if the returned future is dropped before completion.
    fn run(&self, cmd: &str, args: &[String]) -> impl Future<Output = Result<String>> + Send;
}

// DefaultCommandRunner

pub struct DefaultCommandRunner;

impl CommandRunner for DefaultCommandRunner {
    #[instrument(skip(self, args), fields(command.verb = args.first().map(String::as_str)))]
    async fn run(&self, cmd: &str, args: &[String]) -> Result<String> {
        debug!("running command");
        let output = Command::new(cmd)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await?;
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        if output.status.success() {
            log_output!(debug, DEBUG, combined);
            Ok(combined)
        } else {
            log_output!(error, ERROR, combined);
            Err(Error::CommandFailed {
                code: output.status.code(),
                output: combined,
            })
        }
    }
}

// Tests
