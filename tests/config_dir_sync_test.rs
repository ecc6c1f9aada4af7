//! Integration tests for templating environment files into a config directory

use emap_runner::cli::commands::setup::SetupArgs;
use emap_runner::config::{
    create_or_update_config_dir, discover_environment_files, load_global_config,
};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};

const GLOBAL_CONFIGURATION: &str = r#"
main_git_dir: https://github.com/inform-health-informatics
repositories:
  emap:
  hoover:
rabbitmq:
  RABBITMQ_PORT: 5672
  RABBITMQ_USERNAME: emap
uds:
  UDS_SCHEMA: star
  UDS_JDBC_URL: jdbc:postgresql://canonical
global:
  EMAP_PROJECT_NAME: emap-test
hoover:
  UDS_JDBC_URL: jdbc:postgresql://hoover-only
dates:
  start: 2024-01-01
  end: 2024-01-08
"#;

const RABBITMQ_TEMPLATE: &str = "# Broker settings\nRABBITMQ_PORT=\nRABBITMQ_USERNAME=changeme\n\nNOT_IN_CONFIG=keep=me\n";
const HOOVER_TEMPLATE: &str = "UDS_JDBC_URL=\nUDS_SCHEMA=\nIDS_CFG_DEFAULT_START_DATETIME=\n";

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn checkout(main_dir: &Path) {
    let emap_config = main_dir.join("emap").join("config");
    fs::create_dir_all(&emap_config).unwrap();
    fs::write(emap_config.join("rabbitmq-config-envs.EXAMPLE"), RABBITMQ_TEMPLATE).unwrap();
    fs::write(emap_config.join("notes.txt"), "not an env file\n").unwrap();

    let hoover = main_dir.join("hoover");
    fs::create_dir_all(&hoover).unwrap();
    fs::write(hoover.join("hoover-config-envs.EXAMPLE"), HOOVER_TEMPLATE).unwrap();
}

#[test]
fn test_templates_are_filled_from_configuration() {
    let main_dir = TempDir::new().unwrap();
    checkout(main_dir.path());
    let config_file = write_config(GLOBAL_CONFIGURATION);
    let config = load_global_config(config_file.path()).unwrap();

    let templates = discover_environment_files(&[
        main_dir.path().join("emap").join("config"),
        main_dir.path().join("hoover"),
    ])
    .unwrap();
    let names: Vec<_> = templates.iter().map(|t| t.basename().to_string()).collect();
    assert_eq!(names, ["hoover-config-envs", "rabbitmq-config-envs"]);

    let output = main_dir.path().join("config");
    let report = create_or_update_config_dir(&config, &output, templates).unwrap();
    assert!(report.created_dir);
    assert_eq!(report.written.len(), 2);

    assert_eq!(
        fs::read_to_string(output.join("rabbitmq-config-envs")).unwrap(),
        "# Broker settings\nRABBITMQ_PORT=5672\nRABBITMQ_USERNAME=emap\n\nNOT_IN_CONFIG=keep=me\n"
    );
    // The hoover section wins over the canonical uds section for hoover's file
    assert_eq!(
        fs::read_to_string(output.join("hoover-config-envs")).unwrap(),
        "UDS_JDBC_URL=jdbc:postgresql://hoover-only\nUDS_SCHEMA=star\nIDS_CFG_DEFAULT_START_DATETIME=2024-01-01T00:00:00.00Z\n"
    );

    assert_eq!(report.unresolved.len(), 1);
    assert_eq!(report.unresolved[0].file, "rabbitmq-config-envs");
    assert_eq!(report.unresolved[0].line, "NOT_IN_CONFIG=keep=me");
}

#[test]
fn test_update_keeps_unrelated_files() {
    let main_dir = TempDir::new().unwrap();
    checkout(main_dir.path());
    let output = main_dir.path().join("config");
    fs::create_dir_all(&output).unwrap();
    fs::write(output.join("local-notes"), "mine\n").unwrap();

    let config_file = write_config(GLOBAL_CONFIGURATION);
    let config = load_global_config(config_file.path()).unwrap();
    let templates = discover_environment_files(&[main_dir.path().join("hoover")]).unwrap();

    let report = create_or_update_config_dir(&config, &output, templates).unwrap();
    assert!(!report.created_dir);
    assert_eq!(fs::read_to_string(output.join("local-notes")).unwrap(), "mine\n");
    assert!(report.unresolved.is_empty());
}

#[tokio::test]
async fn test_setup_command_end_to_end() {
    let main_dir = TempDir::new().unwrap();
    checkout(main_dir.path());
    let config_file = write_config(GLOBAL_CONFIGURATION);

    let args = SetupArgs { output_dir: None };
    let code = args
        .execute(config_file.path().to_str().unwrap(), main_dir.path())
        .await
        .unwrap();
    assert_eq!(code, 0);

    let output = main_dir.path().join("config");
    assert!(output.join("rabbitmq-config-envs").is_file());
    assert!(output.join("hoover-config-envs").is_file());
    assert!(!output.join("notes.txt").exists());
}

#[tokio::test]
async fn test_setup_command_missing_repositories() {
    let main_dir = TempDir::new().unwrap();
    let config_file = write_config("global:\n  EMAP_PROJECT_NAME: emap-test\n");

    let args = SetupArgs { output_dir: None };
    let code = args
        .execute(config_file.path().to_str().unwrap(), main_dir.path())
        .await
        .unwrap();
    assert_eq!(code, 2);
}
