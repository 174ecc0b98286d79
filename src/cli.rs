use crate::batch::run_batch;
use crate::config::loader::{resolve, split_list};
use crate::config::types::GradingConfig;
use crate::config::validator::{check_config, validate_config};
use crate::exec::ProcessRunner;
use crate::observability::audit::init_batch_logger;
use crate::operator::{ScriptedOperator, TerminalOperator};
use crate::safety::shutdown::ShutdownSignal;
use crate::submission::archive::SubmissionArchive;
use crate::submission::ArchiveIdentity;
use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about = "Gradescripted lab grading tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, compile, verify and report every submission archive
    Grade(ConfigArgs),
    /// Validate the configuration and print it as JSON
    CheckConfig(ConfigArgs),
    /// Show how an archive name parses and what the archive contains
    Inspect {
        /// Submission archive (.tgz)
        archive: PathBuf,
    },
}

/// Grading settings; flags override values from `--config`
#[derive(Args, Debug, Default)]
struct ConfigArgs {
    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Due date as a string ("01/30/2016 23:30")
    #[arg(long, value_name = "TIME")]
    due: Option<String>,
    /// Path to the provided lab files
    #[arg(long = "labpath", value_name = "PATH")]
    lab_path: Option<PathBuf>,
    /// Comma separated list of files to be extracted from each submission
    #[arg(long = "sourcefiles", value_name = "FILES")]
    source_files: Option<String>,
    /// Comma separated list of compilation commands
    #[arg(long = "compcmds", value_name = "CMDS")]
    compile_commands: Option<String>,
    /// Comma separated list of files provided by the lab
    #[arg(long = "commonfiles", value_name = "FILES")]
    common_files: Option<String>,
    /// Problems to run, e.g. 1-5,15,17,20-25; defaults to the aggregate verifier
    #[arg(long = "probset", value_name = "PROBS")]
    problems: Option<String>,
    /// Write the final report to FILE instead of stdout
    #[arg(long = "reportfile", value_name = "FILE")]
    report_file: Option<PathBuf>,
    /// Seconds allowed for the aggregate verifier
    #[arg(long = "gatimeout", value_name = "SECONDS")]
    aggregate_timeout: Option<u64>,
    /// Seconds allowed for each problem verifier run
    #[arg(long = "gstimeout", value_name = "SECONDS")]
    problem_timeout: Option<u64>,
    /// Seconds allowed for each compilation command
    #[arg(long, value_name = "SECONDS")]
    compile_timeout: Option<u64>,
    /// Directory holding the submission archives
    #[arg(long, value_name = "DIR")]
    archive_dir: Option<PathBuf>,
    /// Directory submissions are extracted into
    #[arg(long, value_name = "DIR")]
    extract_dir: Option<PathBuf>,
    /// Shared scratch directory (recreated on every run)
    #[arg(long, value_name = "DIR")]
    workspace: Option<PathBuf>,
    /// Batch event log
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
    /// Skip missing-file prompts and manual review
    #[arg(long)]
    non_interactive: bool,
}

impl ConfigArgs {
    fn overrides(&self) -> Map<String, Value> {
        let mut map = Map::new();
        let mut set = |key: &str, value: Value| {
            map.insert(key.to_string(), value);
        };
        let path = |p: &Option<PathBuf>| {
            p.as_ref()
                .map(|p| Value::from(p.to_string_lossy().into_owned()))
                .unwrap_or(Value::Null)
        };
        let list = |raw: &Option<String>| {
            raw.as_deref()
                .map(|raw| Value::from(split_list(raw)))
                .unwrap_or(Value::Null)
        };

        set("due", self.due.clone().map(Value::from).unwrap_or(Value::Null));
        set("lab_path", path(&self.lab_path));
        set("source_files", list(&self.source_files));
        set("compile_commands", list(&self.compile_commands));
        set("common_files", list(&self.common_files));
        set(
            "problems",
            self.problems.clone().map(Value::from).unwrap_or(Value::Null),
        );
        set("report_file", path(&self.report_file));
        set(
            "aggregate_timeout_secs",
            self.aggregate_timeout.map(Value::from).unwrap_or(Value::Null),
        );
        set(
            "problem_timeout_secs",
            self.problem_timeout.map(Value::from).unwrap_or(Value::Null),
        );
        set(
            "compile_timeout_secs",
            self.compile_timeout.map(Value::from).unwrap_or(Value::Null),
        );
        set("archive_dir", path(&self.archive_dir));
        set("extract_dir", path(&self.extract_dir));
        set("workspace_dir", path(&self.workspace));
        set("log_file", path(&self.log_file));
        if self.non_interactive {
            set("interactive", Value::Bool(false));
        }
        map
    }

    fn resolve(&self) -> Result<GradingConfig> {
        Ok(resolve(self.config.as_deref(), self.overrides())?)
    }
}

pub fn run() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Grade(args) => grade(&args),
        Commands::CheckConfig(args) => check(&args),
        Commands::Inspect { archive } => inspect(&archive),
    }
}

fn grade(args: &ConfigArgs) -> Result<()> {
    let config = args.resolve()?;
    validate_config(&config)?;

    let shutdown = ShutdownSignal::install()?;
    init_batch_logger(&config.log_file, true)?;

    let runner = ProcessRunner::new();
    let outcome = if config.interactive {
        let mut operator = TerminalOperator::stdio(&config.pager);
        run_batch(&config, runner, &mut operator, &shutdown)?
    } else {
        let mut operator = ScriptedOperator::default();
        run_batch(&config, runner, &mut operator, &shutdown)?
    };

    for (archive, reason) in &outcome.skipped {
        eprintln!("Skipped {}: {}", archive, reason);
    }
    if outcome.interrupted {
        match shutdown.signal() {
            Some(signal) => bail!("Grading interrupted by {}", signal),
            None => bail!("Grading interrupted"),
        }
    }
    Ok(())
}

fn check(args: &ConfigArgs) -> Result<()> {
    let config = args.resolve()?;
    let result = check_config(&config);

    for warning in &result.warnings {
        eprintln!("Warning: {}", warning);
    }
    for error in &result.errors {
        eprintln!("Error: {}", error);
    }
    println!("{}", serde_json::to_string_pretty(&config)?);

    if !result.is_valid() {
        bail!("Configuration has {} error(s)", result.errors.len());
    }
    Ok(())
}

fn inspect(path: &Path) -> Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let identity = match ArchiveIdentity::parse(&name) {
        Ok(identity) => serde_json::json!({
            "assignment": identity.assignment(),
            "section": identity.section(),
            "student": identity.student(),
            "submitted_epoch": identity.submitted_epoch(),
            "submitted_at": identity.submitted_at()?.to_string(),
            "dir_name": identity.dir_name(),
        }),
        Err(e) => serde_json::json!({ "error": e.to_string() }),
    };
    let archive = SubmissionArchive::open(path)?;

    let report = serde_json::json!({
        "archive": archive.name(),
        "identity": identity,
        "entries": archive.listing(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_original_flag_names() {
        let cli = Cli::try_parse_from([
            "labgrade",
            "grade",
            "--due",
            "01/30/2016 23:30",
            "--labpath",
            "/labs/lab3",
            "--sourcefiles",
            "main.c,list.c",
            "--probset",
            "1-3,7",
            "--gstimeout",
            "10",
            "--non-interactive",
        ])
        .unwrap();

        let Commands::Grade(args) = cli.command else {
            panic!("expected grade");
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.source_files, vec!["main.c", "list.c"]);
        assert_eq!(config.problems.unwrap().as_slice(), &[1, 2, 3, 7]);
        assert_eq!(config.problem_timeout_secs, 10);
        assert_eq!(config.compile_commands, vec!["make"]);
        assert!(!config.interactive);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("grading.json");
        std::fs::write(
            &file,
            r#"{"due": "01/30/2016 23:30", "lab_path": "/labs/lab3",
                "source_files": ["main.c"], "aggregate_timeout_secs": 100}"#,
        )
        .unwrap();

        let args = ConfigArgs {
            config: Some(file),
            aggregate_timeout: Some(60),
            compile_commands: Some("make clean,make".to_string()),
            ..ConfigArgs::default()
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.aggregate_timeout_secs, 60);
        assert_eq!(config.compile_commands, vec!["make clean", "make"]);
        assert_eq!(config.source_files, vec!["main.c"]);
        assert!(config.interactive);
    }
}
