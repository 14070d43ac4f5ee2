//! End-to-end tests: CSV corpus -> training -> bundle on disk -> inference

use health_lib::{
    CsvRecordSource, ForestConfig, HealthClassifier, HealthLabel, MemorySource, ModelBundle,
    PipelineConfig, RawMetricRecord, TrainingPipeline,
};
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

const HEADER: &str =
    "timestamp,container_id,name,cpu_perc,mem_usage,mem_limit,mem_perc,net_io,block_io,pids,label";

/// 50 working samples around 10% / 100MiB and 50 error samples around
/// 90% / 900MiB, as produced by the collector
fn write_corpus() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    for i in 0..50 {
        let jitter = (i % 7) as f64 * 0.5 - 1.5;
        writeln!(
            file,
            "2024-05-01T10:00:{:02},w{},standard_container,{:.2}%,{:.1}MiB / 1000MiB,,{:.2}%,1kB / 0B,0B / 0B,{},working",
            i % 60,
            i,
            10.0 + jitter,
            100.0 + jitter * 4.0,
            10.0 + jitter,
            5 + i % 3
        )
        .unwrap();
        writeln!(
            file,
            "2024-05-01T10:01:{:02},e{},failure_container,{:.2}%,{:.1}MiB / 1000MiB,,{:.2}%,1kB / 0B,0B / 0B,{},error",
            i % 60,
            i,
            90.0 + jitter,
            900.0 + jitter * 4.0,
            90.0 + jitter,
            240 + i % 20
        )
        .unwrap();
    }
    // A few rows the cleaner has to discard
    writeln!(file, "2024-05-01T10:02:00,x1,broken,N/A,,,,,,,working").unwrap();
    writeln!(file, "2024-05-01T10:02:01,x2,unlabeled,10%,100MiB / 1000MiB,,10%,,,5,").unwrap();
    file.flush().unwrap();
    file
}

fn pipeline() -> TrainingPipeline {
    TrainingPipeline::new(PipelineConfig {
        forest: ForestConfig {
            n_trees: 25,
            ..ForestConfig::default()
        },
        ..PipelineConfig::default()
    })
    .unwrap()
}

#[test]
fn test_train_save_load_classify() {
    let corpus = write_corpus();
    let outcome = pipeline().run(&CsvRecordSource::new(corpus.path())).unwrap();

    assert_eq!(outcome.drops.total(), 2);
    assert_eq!(outcome.train_size + outcome.test_size, 100);
    assert!(outcome.report.accuracy >= 0.95);

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("health_model.json");
    outcome.bundle.save(&path).unwrap();

    let service = HealthClassifier::load(&path).unwrap();
    let healthy = RawMetricRecord::from_metrics("12%", "110MiB / 1000MiB", "", "11%", "6");
    let failing = RawMetricRecord::from_metrics("90%", "900MiB / 1000MiB", "", "90%", "250");
    assert_eq!(service.classify(&healthy), HealthLabel::Working);
    assert_eq!(service.classify(&failing), HealthLabel::Error);
    assert_eq!(service.score(&failing).code, 1);
}

#[test]
fn test_reloaded_bundle_predicts_identically() {
    let corpus = write_corpus();
    let outcome = pipeline().run(&CsvRecordSource::new(corpus.path())).unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("health_model.json");
    outcome.bundle.save(&path).unwrap();
    let reloaded = ModelBundle::load(&path).unwrap();
    assert_eq!(reloaded.scaler, outcome.bundle.scaler);

    let fresh = HealthClassifier::from_bundle(outcome.bundle);
    let restored = HealthClassifier::from_bundle(reloaded);
    for cpu in [0.0, 25.0, 50.0, 60.0, 75.0, 99.0] {
        let usage = format!("{}MiB / 1000MiB", cpu * 10.0);
        let record = RawMetricRecord::from_metrics(
            format!("{}%", cpu),
            usage,
            "",
            format!("{}%", cpu),
            format!("{}", (cpu * 2.5) as u32),
        );
        assert_eq!(fresh.score(&record), restored.score(&record));
    }
}

#[test]
fn test_two_runs_produce_the_same_model() {
    let corpus = write_corpus();
    let source = CsvRecordSource::new(corpus.path());
    let a = pipeline().run(&source).unwrap();
    let b = pipeline().run(&source).unwrap();
    assert_eq!(a.bundle.checksum(), b.bundle.checksum());
    assert_eq!(a.report, b.report);
}

#[test]
fn test_empty_fields_impute_to_zero_at_inference() {
    let corpus = write_corpus();
    let outcome = pipeline().run(&CsvRecordSource::new(corpus.path())).unwrap();
    let service = HealthClassifier::from_bundle(outcome.bundle);

    let blank = RawMetricRecord::from_metrics("", "", "", "", "");
    let zeros = RawMetricRecord::from_metrics("0", "0", "0", "0", "0");
    assert_eq!(service.score(&blank), service.score(&zeros));
}

/// Two tight clusters with no spread inside either class
#[test]
fn test_identical_rows_per_class() {
    let mut records = Vec::new();
    for _ in 0..50 {
        records.push(
            RawMetricRecord::from_metrics("10%", "100MiB / 1000MiB", "", "10%", "5")
                .with_label("working"),
        );
        records.push(
            RawMetricRecord::from_metrics("95%", "950MiB / 1000MiB", "", "95%", "300")
                .with_label("error"),
        );
    }
    let outcome = pipeline().run(&MemorySource::new(records)).unwrap();
    assert!(outcome.bundle.scaler.constant[2], "mem_limit is constant");
    assert_eq!(outcome.report.accuracy, 1.0);

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("health_model.json");
    outcome.bundle.save(&path).unwrap();
    let service = HealthClassifier::load(&path).unwrap();

    let healthy = RawMetricRecord::from_metrics("12%", "110MiB / 1000MiB", "", "11%", "6");
    let failing = RawMetricRecord::from_metrics("90%", "900MiB / 1000MiB", "", "90%", "250");
    assert_eq!(service.classify(&healthy), HealthLabel::Working);
    assert_eq!(service.classify(&failing), HealthLabel::Error);
}

/// Very large but finite readings must produce a bundle that reloads
#[test]
fn test_huge_values_train_and_reload() {
    let records: Vec<RawMetricRecord> = (1..=20)
        .map(|k| {
            let label = if k % 2 == 0 { "error" } else { "working" };
            RawMetricRecord::from_metrics("10%", "100MiB / 1000MiB", "", "10%", format!("{}e200", k))
                .with_label(label)
        })
        .collect();
    let outcome = pipeline().run(&MemorySource::new(records)).unwrap();
    assert!(outcome.bundle.scaler.validate().is_ok());

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("health_model.json");
    outcome.bundle.save(&path).unwrap();
    let reloaded = ModelBundle::load(&path).unwrap();
    assert_eq!(reloaded.scaler, outcome.bundle.scaler);
}
