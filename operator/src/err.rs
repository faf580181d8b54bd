// Consts

const MAX_OUTPUT_LEN: usize = 1024;

// Types

pub type Result<VALUE = ()> = std::result::Result<VALUE, Error>;

// Error

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("command exited with {}: {}", exit_code(.code), truncate(.output))]
    CommandFailed { code: Option<i32>, output: String },
    #[error("resource was modified concurrently")]
    Conflict,
    #[error("i/o error: {0}")]
    Io(
        #[from]
        #[source]
        std::io::Error,
    ),
    #[error("kubernetes error: {0}")]
    Kube(#[source] kube::Error),
    #[error("resource doesn't have name")]
    UnnamedResource,
    #[error("resource doesn't have namespace")]
    UnnamespacedResource,
}

impl From<kube::Error> for Error {
    fn from(err: kube::Error) -> Self {
        if sledge_core::kube::is_conflict(&err) {
            Self::Conflict
        } else {
            Self::Kube(err)
        }
    }
}

// Functions

fn exit_code(code: &Option<i32>) -> String {
    code.map(|code| format!("code {code}"))
        .unwrap_or_else(|| "signal".into())
}

fn truncate(output: &str) -> &str {
    let output = output.trim();
    match output.char_indices().nth(MAX_OUTPUT_LEN) {
        Some((idx, _)) => &output[..idx],
        None => output,
    }
}

// Tests
