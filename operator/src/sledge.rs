use std::future::Future;

use regex::Regex;
use serde::Deserialize;
use sledge_core::CloudSqlInstanceSpec;
use tracing::{debug, info, instrument, warn};

use crate::{
    cmd::{CommandRunner, DefaultCommandRunner},
    err::{Error, Result},
};

// Consts

const VERB_CREATE: &str = "create";
const VERB_DELETE: &str = "delete";
const VERB_DESCRIBE: &str = "describe";
const VERB_UPDATE: &str = "upgrade";

// Data structs

/// Instance as reported by `sledge describe`.
///
/// Every field defaults to empty so a partial document still parses.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ObservedInstance {
    pub database_version: String,
    pub ip_addresses: Vec<IpAddress>,
    pub name: String,
    pub region: String,
    pub settings: Settings,
    pub state: String,
}

impl ObservedInstance {
    pub fn first_ip_address(&self) -> Option<&str> {
        self.ip_addresses
            .first()
            .map(|addr| addr.ip_address.as_str())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct IpAddress {
    pub ip_address: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub tier: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Deletion {
    /// sledge reported the instance was already gone.
    AlreadyGone,
    Deleted,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Lookup {
    Found(ObservedInstance),
    NotFound,
}

// Traits

#[cfg_attr(test, mockall::automock)]
pub trait InstanceManager: Send + Sync {
    fn create(&self, spec: &CloudSqlInstanceSpec) -> impl Future<Output = Result> + Send;

    fn delete(
        &self,
        project: &str,
        instance: &str,
    ) -> impl Future<Output = Result<Deletion>> + Send;

    fn describe(
        &self,
        project: &str,
        instance: &str,
    ) -> impl Future<Output = Result<Lookup>> + Send;

    fn update(&self, spec: &CloudSqlInstanceSpec) -> impl Future<Output = Result> + Send;
}

// SledgeInstanceManager

pub struct SledgeInstanceManager<RUNNER: CommandRunner> {
    bin: String,
    not_found: Option<Regex>,
    runner: RUNNER,
}

impl SledgeInstanceManager<DefaultCommandRunner> {
    pub fn new(bin: String, not_found: Option<Regex>) -> Self {
        Self {
            bin,
            not_found,
            runner: DefaultCommandRunner,
        }
    }
}

impl<RUNNER: CommandRunner> SledgeInstanceManager<RUNNER> {
    // sledge has no structured error taxonomy: a failed describe is the only not-found signal.
    fn is_not_found(&self, output: &str) -> bool {
        self.not_found
            .as_ref()
            .map(|regex| regex.is_match(output))
            .unwrap_or(true)
    }

    // Only a configured pattern can prove the instance is gone.
    fn is_already_gone(&self, output: &str) -> bool {
        self.not_found
            .as_ref()
            .map(|regex| regex.is_match(output))
            .unwrap_or(false)
    }

    fn target_args(verb: &str, project: &str, instance: &str) -> Vec<String> {
        vec![
            verb.into(),
            format!("--project={project}"),
            format!("--instance={instance}"),
        ]
    }
}

impl<RUNNER: CommandRunner> InstanceManager for SledgeInstanceManager<RUNNER> {
    #[instrument(skip(self, spec), fields(instance.name = spec.instance_name, instance.project = spec.project_id))]
    async fn create(&self, spec: &CloudSqlInstanceSpec) -> Result {
        let mut args = Self::target_args(VERB_CREATE, &spec.project_id, &spec.instance_name);
        args.extend([
            format!("--region={}", spec.region),
            format!("--dbVersion={}", spec.database_version),
            format!("--tier={}", spec.tier),
        ]);
        info!("creating instance");
        self.runner.run(&self.bin, &args).await?;
        info!("instance successfully created");
        Ok(())
    }

    #[instrument(skip(self, project, instance), fields(instance.name = instance, instance.project = project))]
    async fn delete(&self, project: &str, instance: &str) -> Result<Deletion> {
        let args = Self::target_args(VERB_DELETE, project, instance);
        info!("deleting instance");
        match self.runner.run(&self.bin, &args).await {
            Ok(_) => {
                info!("instance successfully deleted");
                Ok(Deletion::Deleted)
            }
            Err(Error::CommandFailed { code, output }) => {
                if self.is_already_gone(&output) {
                    info!("instance was already deleted");
                    Ok(Deletion::AlreadyGone)
                } else {
                    Err(Error::CommandFailed { code, output })
                }
            }
            Err(err) => Err(err),
        }
    }

    #[instrument(skip(self, project, instance), fields(instance.name = instance, instance.project = project))]
    async fn describe(&self, project: &str, instance: &str) -> Result<Lookup> {
        let args = Self::target_args(VERB_DESCRIBE, project, instance);
        debug!("describing instance");
        match self.runner.run(&self.bin, &args).await {
            Ok(output) => {
                let observed = serde_json::from_str(&output).unwrap_or_else(|err| {
                    warn!("failed to parse describe output: {err}");
                    ObservedInstance::default()
                });
                Ok(Lookup::Found(observed))
            }
            Err(Error::CommandFailed { code, output }) => {
                if self.is_not_found(&output) {
                    debug!("instance doesn't exist");
                    Ok(Lookup::NotFound)
                } else {
                    Err(Error::CommandFailed { code, output })
                }
            }
            Err(err) => Err(err),
        }
    }

    #[instrument(skip(self, spec), fields(instance.name = spec.instance_name, instance.project = spec.project_id))]
    async fn update(&self, spec: &CloudSqlInstanceSpec) -> Result {
        let mut args = Self::target_args(VERB_UPDATE, &spec.project_id, &spec.instance_name);
        args.extend([
            format!("--dbVersion={}", spec.database_version),
            format!("--tier={}", spec.tier),
        ]);
        info!("updating instance");
        self.runner.run(&self.bin, &args).await?;
        info!("instance successfully updated");
        Ok(())
    }
}

// Tests

#[cfg(test)]
mod test {
    use crate::{cmd::MockCommandRunner, test::*};

    use super::*;

    // Data

    #[derive(Clone)]
    struct Data {
        args: Vec<String>,
        bin: &'static str,
        not_found: Option<&'static str>,
        spec: CloudSqlInstanceSpec,
    }

    impl Default for Data {
        fn default() -> Self {
            Self {
                args: vec![],
                bin: "sledge",
                not_found: None,
                spec: CloudSqlInstanceSpec {
                    database_version: "POSTGRES_14".into(),
                    instance_name: "db1".into(),
                    project_id: "p1".into(),
                    region: "us-east1".into(),
                    tier: "db-f1-micro".into(),
                },
            }
        }
    }

    // Functions

    fn manager(
        data: &Data,
        run: MockFn<Result<String>>,
        times: usize,
    ) -> SledgeInstanceManager<MockCommandRunner> {
        init_tracer();
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf({
                let data = data.clone();
                move |bin, args| bin == data.bin && args == data.args
            })
            .times(times)
            .returning(move |_, _| {
                let run = run.clone();
                Box::pin(async move { run() })
            });
        SledgeInstanceManager {
            bin: data.bin.into(),
            not_found: data.not_found.map(|pattern| Regex::new(pattern).unwrap()),
            runner,
        }
    }

    fn args(args: &[&str]) -> Vec<String> {
        args.iter().map(|arg| arg.to_string()).collect()
    }

    // Mods

    mod sledge_instance_manager {
        use super::*;

        // Mods

        mod create {
            use super::*;

            #[tokio::test]
            async fn ok() {
                let data = Data {
                    args: args(&[
                        "create",
                        "--project=p1",
                        "--instance=db1",
                        "--region=us-east1",
                        "--dbVersion=POSTGRES_14",
                        "--tier=db-f1-micro",
                    ]),
                    ..Default::default()
                };
                let mgr = manager(&data, mock_fn(&(), |_| Ok(String::new())), 1);
                mgr.create(&data.spec).await.unwrap();
            }

            #[tokio::test]
            async fn failure() {
                let data = Data {
                    args: args(&[
                        "create",
                        "--project=p1",
                        "--instance=db1",
                        "--region=us-east1",
                        "--dbVersion=POSTGRES_14",
                        "--tier=db-f1-micro",
                    ]),
                    ..Default::default()
                };
                let mgr = manager(
                    &data,
                    mock_fn(&(), |_| {
                        Err(Error::CommandFailed {
                            code: Some(1),
                            output: "quota exceeded".into(),
                        })
                    }),
                    1,
                );
                let err = mgr.create(&data.spec).await.unwrap_err();
                assert!(err.to_string().contains("quota exceeded"));
            }
        }

        mod delete {
            use super::*;

            #[tokio::test]
            async fn ok() {
                let data = Data {
                    args: args(&["delete", "--project=p1", "--instance=db1"]),
                    ..Default::default()
                };
                let mgr = manager(&data, mock_fn(&(), |_| Ok(String::new())), 1);
                let deletion = mgr.delete("p1", "db1").await.unwrap();
                assert_eq!(deletion, Deletion::Deleted);
            }

            #[tokio::test]
            async fn already_gone() {
                let data = Data {
                    args: args(&["delete", "--project=p1", "--instance=db1"]),
                    not_found: Some("does not exist"),
                    ..Default::default()
                };
                let mgr = manager(
                    &data,
                    mock_fn(&(), |_| {
                        Err(Error::CommandFailed {
                            code: Some(1),
                            output: "instance db1 does not exist".into(),
                        })
                    }),
                    1,
                );
                let deletion = mgr.delete("p1", "db1").await.unwrap();
                assert_eq!(deletion, Deletion::AlreadyGone);
            }

            #[tokio::test]
            async fn failure_without_pattern() {
                let data = Data {
                    args: args(&["delete", "--project=p1", "--instance=db1"]),
                    ..Default::default()
                };
                let mgr = manager(
                    &data,
                    mock_fn(&(), |_| {
                        Err(Error::CommandFailed {
                            code: Some(1),
                            output: "instance db1 does not exist".into(),
                        })
                    }),
                    1,
                );
                let err = mgr.delete("p1", "db1").await.unwrap_err();
                assert!(matches!(err, Error::CommandFailed { .. }));
            }

            #[tokio::test]
            async fn failure_pattern_mismatches() {
                let data = Data {
                    args: args(&["delete", "--project=p1", "--instance=db1"]),
                    not_found: Some("does not exist"),
                    ..Default::default()
                };
                let mgr = manager(
                    &data,
                    mock_fn(&(), |_| {
                        Err(Error::CommandFailed {
                            code: Some(1),
                            output: "backend unavailable".into(),
                        })
                    }),
                    1,
                );
                let err = mgr.delete("p1", "db1").await.unwrap_err();
                assert!(matches!(err, Error::CommandFailed { .. }));
            }
        }

        mod describe {
            use super::*;

            // Tests

            async fn test(data: Data, run: MockFn<Result<String>>) -> Result<Lookup> {
                let data = Data {
                    args: args(&["describe", "--project=p1", "--instance=db1"]),
                    ..data
                };
                let mgr = manager(&data, run, 1);
                mgr.describe("p1", "db1").await
            }

            #[tokio::test]
            async fn found() {
                let output = r#"{
                    "name": "db1",
                    "region": "us-east1",
                    "databaseVersion": "POSTGRES_14",
                    "state": "RUNNABLE",
                    "settings": {"tier": "db-f1-micro", "dataDiskSizeGb": "10"},
                    "ipAddresses": [
                        {"ipAddress": "10.0.0.1", "type": "PRIVATE"},
                        {"ipAddress": "34.1.2.3", "type": "PRIMARY"}
                    ]
                }"#;
                let lookup = test(Data::default(), mock_fn(&output, |out| Ok(out.into())))
                    .await
                    .unwrap();
                let expected = ObservedInstance {
                    database_version: "POSTGRES_14".into(),
                    ip_addresses: vec![
                        IpAddress {
                            ip_address: "10.0.0.1".into(),
                        },
                        IpAddress {
                            ip_address: "34.1.2.3".into(),
                        },
                    ],
                    name: "db1".into(),
                    region: "us-east1".into(),
                    settings: Settings {
                        tier: "db-f1-micro".into(),
                    },
                    state: "RUNNABLE".into(),
                };
                assert_eq!(lookup, Lookup::Found(expected.clone()));
                assert_eq!(expected.first_ip_address(), Some("10.0.0.1"));
            }

            #[tokio::test]
            async fn found_partial() {
                let output = r#"{"state": "PENDING_CREATE", "databaseVersion": "POSTGRES_14"}"#;
                let lookup = test(Data::default(), mock_fn(&output, |out| Ok(out.into())))
                    .await
                    .unwrap();
                let expected = ObservedInstance {
                    database_version: "POSTGRES_14".into(),
                    state: "PENDING_CREATE".into(),
                    ..Default::default()
                };
                assert_eq!(lookup, Lookup::Found(expected.clone()));
                assert_eq!(expected.first_ip_address(), None);
            }

            #[tokio::test]
            async fn malformed_output() {
                let lookup = test(
                    Data::default(),
                    mock_fn(&(), |_| Ok("WARNING: not json".into())),
                )
                .await
                .unwrap();
                assert_eq!(lookup, Lookup::Found(ObservedInstance::default()));
            }

            #[tokio::test]
            async fn not_found() {
                let lookup = test(
                    Data::default(),
                    mock_fn(&(), |_| {
                        Err(Error::CommandFailed {
                            code: Some(1),
                            output: "instance db1 does not exist".into(),
                        })
                    }),
                )
                .await
                .unwrap();
                assert_eq!(lookup, Lookup::NotFound);
            }

            #[tokio::test]
            async fn not_found_pattern_matches() {
                let data = Data {
                    not_found: Some("does not exist"),
                    ..Default::default()
                };
                let lookup = test(
                    data,
                    mock_fn(&(), |_| {
                        Err(Error::CommandFailed {
                            code: Some(1),
                            output: "instance db1 does not exist".into(),
                        })
                    }),
                )
                .await
                .unwrap();
                assert_eq!(lookup, Lookup::NotFound);
            }

            #[tokio::test]
            async fn not_found_pattern_mismatches() {
                let data = Data {
                    not_found: Some("does not exist"),
                    ..Default::default()
                };
                let err = test(
                    data,
                    mock_fn(&(), |_| {
                        Err(Error::CommandFailed {
                            code: Some(1),
                            output: "permission denied".into(),
                        })
                    }),
                )
                .await
                .unwrap_err();
                assert!(matches!(err, Error::CommandFailed { .. }));
            }

            #[tokio::test]
            async fn io_error() {
                let err = test(
                    Data::default(),
                    mock_fn(&(), |_| {
                        Err(Error::Io(std::io::Error::from(
                            std::io::ErrorKind::NotFound,
                        )))
                    }),
                )
                .await
                .unwrap_err();
                assert!(matches!(err, Error::Io(_)));
            }
        }

        mod update {
            use super::*;

            #[tokio::test]
            async fn ok() {
                let data = Data {
                    args: args(&[
                        "upgrade",
                        "--project=p1",
                        "--instance=db1",
                        "--dbVersion=POSTGRES_14",
                        "--tier=db-f1-micro",
                    ]),
                    ..Default::default()
                };
                let mgr = manager(&data, mock_fn(&(), |_| Ok(String::new())), 1);
                mgr.update(&data.spec).await.unwrap();
            }
        }
    }
}
