//! Trainer binary integration tests

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const HEADER: &str =
    "timestamp,container_id,name,cpu_perc,mem_usage,mem_limit,mem_perc,net_io,block_io,pids,label";

fn write_corpus(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("docker_stats.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    for i in 0..30 {
        writeln!(
            file,
            "t,w{i},standard_container,{}%,{}MiB / 1000MiB,,{}%,,,{},working",
            8 + i % 5,
            100 + i,
            10 + i % 4,
            4 + i % 3
        )
        .unwrap();
        writeln!(
            file,
            "t,e{i},failure_container,{}%,{}MiB / 1000MiB,,{}%,,,{},error",
            88 + i % 5,
            880 + i,
            89 + i % 4,
            220 + i
        )
        .unwrap();
    }
    writeln!(file, "t,x,odd_container,5%,10MiB / 1000MiB,,1%,,,2,degraded").unwrap();
    path
}

fn trainer(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_health-trainer"))
        .args(args)
        .env_remove("HEALTH_TRAINER_CONFIG")
        .output()
        .expect("Failed to execute health-trainer")
}

/// Test that the trainer shows help
#[test]
fn test_trainer_help() {
    let output = trainer(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "help should succeed");
    assert!(stdout.contains("--data"), "Should show data flag");
    assert!(stdout.contains("--bundle"), "Should show bundle flag");
    assert!(stdout.contains("--n-trees"), "Should show n-trees flag");
}

/// Test a full training run writing a bundle and a report
#[test]
fn test_training_run_writes_bundle() {
    let dir = TempDir::new().unwrap();
    let data = write_corpus(dir.path());
    let bundle = dir.path().join("model").join("health_model.json");
    let metrics = dir.path().join("metrics.prom");

    let output = trainer(&[
        "--data",
        data.to_str().unwrap(),
        "--bundle",
        bundle.to_str().unwrap(),
        "--metrics-out",
        metrics.to_str().unwrap(),
        "--n-trees",
        "10",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(output.status.success(), "training should succeed: {}", stderr);
    assert!(bundle.exists(), "bundle should be written");
    assert!(stdout.contains("TN="), "report should list confusion counts");
    assert!(stdout.contains("unrecognized_label"), "drops should be listed");

    let metrics_text = std::fs::read_to_string(&metrics).unwrap();
    assert!(metrics_text.contains("health_classifier_trees_built_total"));

    let doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&bundle).unwrap()).unwrap();
    assert_eq!(doc["metadata"]["format_version"], 1);
    assert_eq!(doc["model"]["trees"].as_array().unwrap().len(), 10);
}

/// Test the JSON summary output
#[test]
fn test_json_summary() {
    let dir = TempDir::new().unwrap();
    let data = write_corpus(dir.path());
    let bundle = dir.path().join("health_model.json");

    let output = trainer(&[
        "--data",
        data.to_str().unwrap(),
        "--bundle",
        bundle.to_str().unwrap(),
        "--n-trees",
        "5",
        "--json",
    ]);
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["train_size"].as_u64().unwrap() + summary["test_size"].as_u64().unwrap(), 60);
    assert_eq!(summary["dropped"]["unrecognized_label"], 1);
    assert!(summary["report"]["confusion"]["true_positive"].is_u64());
}

/// Test that strict label checking aborts the run
#[test]
fn test_strict_labels_fail() {
    let dir = TempDir::new().unwrap();
    let data = write_corpus(dir.path());
    let bundle = dir.path().join("health_model.json");

    let output = trainer(&[
        "--data",
        data.to_str().unwrap(),
        "--bundle",
        bundle.to_str().unwrap(),
        "--strict-labels",
    ]);
    assert!(!output.status.success(), "strict run should fail");
    assert!(!bundle.exists(), "no bundle on failure");
}

/// Test that a missing corpus is reported as an error
#[test]
fn test_missing_data_file() {
    let dir = TempDir::new().unwrap();
    let output = trainer(&[
        "--data",
        dir.path().join("absent.csv").to_str().unwrap(),
        "--bundle",
        dir.path().join("health_model.json").to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("training data"));
}

/// Test configuration from a TOML file
#[test]
fn test_config_file() {
    let dir = TempDir::new().unwrap();
    let data = write_corpus(dir.path());
    let bundle = dir.path().join("from_config.json");
    let config = dir.path().join("trainer.toml");
    std::fs::write(
        &config,
        format!(
            "data_path = {:?}\nbundle_path = {:?}\nn_trees = 4\n",
            data.to_str().unwrap(),
            bundle.to_str().unwrap()
        ),
    )
    .unwrap();

    let output = trainer(&["--config", config.to_str().unwrap()]);
    assert!(output.status.success());

    let doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&bundle).unwrap()).unwrap();
    assert_eq!(doc["model"]["trees"].as_array().unwrap().len(), 4);
}
