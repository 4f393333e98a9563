use std::path::Path;

use anyhow::Context;
use farmsim_core::SimConfig;
use farmsim_engine::{CsvSink, Experiment};

const DEFAULT_OUTPUT: &str = "farmsim-results.csv";

pub fn run(
    config_path: &str,
    output: Option<&str>,
    seed: Option<u64>,
    format: &str,
) -> anyhow::Result<()> {
    let mut config = SimConfig::from_file(Path::new(config_path))
        .with_context(|| format!("loading {config_path}"))?;
    if let Some(seed) = seed {
        config.simulation.seed = seed;
    }

    let output_path = output
        .map(str::to_string)
        .or_else(|| config.output.as_ref().map(|o| o.path.clone()))
        .unwrap_or_else(|| DEFAULT_OUTPUT.to_string());
    let sink = CsvSink::create(Path::new(&output_path))
        .with_context(|| format!("creating {output_path}"))?;

    let summary = Experiment::new(config)?.run(Box::new(sink))?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        "text" => {
            println!("✓ Simulation complete ({} run(s))", summary.runs);
            println!("  Completed jobs:   {}", summary.completed);
            println!("  Final clock:      {:.3}", summary.final_clock);
            println!(
                "  Scaling:          {} out / {} in / {} refused",
                summary.scale_outs, summary.scale_ins, summary.refused_scale_ins
            );
            println!("  Servers remaining: {}", summary.servers_remaining);
            println!("  Drift corrections: {}", summary.drift_corrections);
            println!("  Output: {output_path}");
        }
        other => anyhow::bail!("unknown format: {other} (expected text or json)"),
    }
    Ok(())
}

pub fn check(config_path: &str) -> anyhow::Result<()> {
    match SimConfig::from_file(Path::new(config_path)) {
        Ok(config) => {
            println!("✓ {config_path} is valid");
            println!("  Scheduling: {}", config.cluster.scheduling);
            println!("  Workload:   {}", config.workload.kind);
            println!("  Run policy: {}", config.run.policy);
            Ok(())
        }
        Err(e) => {
            eprintln!("Config invalid: {e}");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("farmsim.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    const VALID: &str = r#"
[simulation]
duration = 50.0
seed = 3

[cluster]
initial_servers = 1
scheduling = "least-load"

[scaling]
window = 8
r0_min = 0.1
r0_max = 10.0
cooldown = 5.0

[workload]
kind = "exponential"
arrival_mean = 1.0
service_mean = 0.5

[run]
policy = "batch-means"
batch_size = 10
"#;

    #[test]
    fn run_writes_the_csv() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), VALID);
        let out = dir.path().join("out.csv");
        run(
            config.to_str().unwrap(),
            Some(out.to_str().unwrap()),
            None,
            "text",
        )
        .unwrap();

        let content = std::fs::read_to_string(&out).unwrap();
        assert!(content.starts_with("batch,completions,"));
    }

    #[test]
    fn check_rejects_a_broken_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), &VALID.replace("least-load", "alphabetical"));
        assert!(check(config.to_str().unwrap()).is_err());
    }

    #[test]
    fn unknown_format_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), VALID);
        let out = dir.path().join("out.csv");
        let err = run(
            config.to_str().unwrap(),
            Some(out.to_str().unwrap()),
            Some(9),
            "yaml",
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown format"));
    }
}
