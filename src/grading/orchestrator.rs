use crate::config::types::{GradingConfig, Result};
use crate::exec::{ProcessRunner, TimedRun};
use crate::grading::score::{compile_failed, count_correct};
use crate::observability::audit::events;
use crate::submission::record::SubmissionRecord;
use std::path::Path;
use std::time::Duration;

/// Which verifier runs after compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifierPlan {
    /// One run of the aggregate verifier
    Aggregate { command: String, timeout: Duration },
    /// One run of the problem verifier per id, in the given order
    PerProblem {
        verifier: String,
        problems: Vec<u32>,
        timeout: Duration,
    },
}

/// Commands and limits applied to every submission in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradingPlan {
    pub compile_commands: Vec<String>,
    pub compile_timeout: Duration,
    pub verifier: VerifierPlan,
}

impl GradingPlan {
    pub fn from_config(config: &GradingConfig) -> Self {
        let verifier = match &config.problems {
            Some(problems) => VerifierPlan::PerProblem {
                verifier: shell_quote(&config.problem_verifier_path().to_string_lossy()),
                problems: problems.as_slice().to_vec(),
                timeout: config.problem_timeout(),
            },
            None => VerifierPlan::Aggregate {
                command: shell_quote(&config.aggregate_verifier_path().to_string_lossy()),
                timeout: config.aggregate_timeout(),
            },
        };

        Self {
            compile_commands: config.compile_commands.clone(),
            compile_timeout: config.compile_timeout(),
            verifier,
        }
    }
}

/// Compiles and scores one staged submission at a time
pub struct Grader {
    runner: ProcessRunner,
    plan: GradingPlan,
}

impl Grader {
    pub fn new(runner: ProcessRunner, plan: GradingPlan) -> Self {
        Self { runner, plan }
    }

    /// Compile, run the verifier(s) and record the score.
    ///
    /// Compile failures and verifier timeouts become notes on `record`; only
    /// a failure to start the shell is returned as an error.
    pub fn grade(&self, record: &mut SubmissionRecord, workspace: &Path) -> Result<u32> {
        events::compile_started(record.handle());
        for command in &self.plan.compile_commands {
            let run = self
                .runner
                .run(command, workspace, self.plan.compile_timeout)?;
            if compile_failed(&run) {
                events::compile_failed(record.handle(), command, run.exit_code);
                record.add_note(format!("Compilation Failed: {}", command));
            }
        }

        events::verify_started(record.handle());
        let mut transcript = String::new();
        match &self.plan.verifier {
            VerifierPlan::Aggregate { command, timeout } => {
                let run = self.runner.run(command, workspace, *timeout)?;
                if run.timed_out {
                    events::verifier_timeout(record.handle(), command, timeout.as_secs());
                    record.add_note("Timed Out");
                }
                append_stdout(&mut transcript, run);
            }
            VerifierPlan::PerProblem {
                verifier,
                problems,
                timeout,
            } => {
                for id in problems {
                    let command = format!("{} {}", verifier, id);
                    let run = self.runner.run(&command, workspace, *timeout)?;
                    if run.timed_out {
                        events::verifier_timeout(record.handle(), &command, timeout.as_secs());
                        record.add_note(format!("Problem {} Timed Out", id));
                    }
                    append_stdout(&mut transcript, run);
                }
            }
        }

        let score = count_correct(&transcript);
        record.set_score(score);
        events::submission_graded(record.handle(), score);
        Ok(score)
    }
}

/// Output printed before a kill still counts toward the score
fn append_stdout(transcript: &mut String, run: TimedRun) {
    if !run.output_complete {
        log::warn!("verifier output may be incomplete");
    }
    transcript.push_str(&run.stdout);
}

/// Single-quote `raw` for `/bin/sh` unless it is plainly safe
fn shell_quote(raw: &str) -> String {
    let plain = !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+,:@%".contains(c));
    if plain {
        raw.to_string()
    } else {
        format!("'{}'", raw.replace('\'', r"'\''"))
    }
}
