//! End-to-end batch scenarios
//!
//! Each test builds a lab directory with shell-script verifiers and real
//! `.tgz` submissions, runs a non-interactive batch, and checks the records,
//! the written report and the state of the shared workspace.

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime};
use flate2::write::GzEncoder;
use flate2::Compression;
use labgrade::exec::process_group::process_is_running;
use labgrade::operator::{PathResolution, ScriptedOperator};
use labgrade::safety::shutdown::NeverStop;
use labgrade::{run_batch, ArchiveIdentity, GradingConfig, ProblemSet, ProcessRunner};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};
use tempfile::TempDir;

struct LabFixture {
    dir: TempDir,
}

impl LabFixture {
    /// Lab with one common file and the given aggregate verifier body
    fn new(gradeall: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let fixture = Self { dir };
        fs::create_dir_all(fixture.lab()).unwrap();
        fs::create_dir_all(fixture.archives()).unwrap();
        fs::write(fixture.lab().join("helper.h"), "#define N 4\n").unwrap();
        fixture.script("gradeall", gradeall);
        fixture
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn lab(&self) -> PathBuf {
        self.root().join("lab")
    }

    fn archives(&self) -> PathBuf {
        self.root().join("archives")
    }

    fn workspace(&self) -> PathBuf {
        self.root().join("tmp")
    }

    fn report(&self) -> PathBuf {
        self.root().join("report.txt")
    }

    fn script(&self, name: &str, body: &str) {
        let path = self.lab().join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn add_archive(&self, name: &str, files: &[(&str, &str)]) {
        let file = File::create(self.archives().join(name)).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (path, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, path, contents.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    fn config(&self, due: NaiveDateTime) -> GradingConfig {
        let mut config = GradingConfig::new(due, self.lab(), vec!["main.c".to_string()]);
        config.compile_commands = vec!["test -f main.c".to_string()];
        config.common_files = vec!["helper.h".to_string()];
        config.archive_dir = self.archives();
        config.extract_dir = self.root().join("extracted");
        config.workspace_dir = self.workspace();
        config.log_file = self.root().join("grades.log");
        config.report_file = Some(self.report());
        config.interactive = false;
        config
    }

    fn workspace_entries(&self) -> BTreeSet<String> {
        fs::read_dir(self.workspace())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }
}

fn far_future() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2099, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn runner() -> ProcessRunner {
    ProcessRunner::new().with_poll_interval(Duration::from_millis(20))
}

const TWO_CORRECT: &str = "if [ -f main.c ]; then\n  echo 'Problem 1 is correct.'\n  echo 'Problem 2 is correct.'\nfi";

#[test]
fn test_end_to_end_scores_notes_and_report() {
    let lab = LabFixture::new(TWO_CORRECT);
    lab.add_archive(
        "lab3.101.jdoe.1700000000.tgz",
        &[("lab3_101_jdoe/main.c", "int main(void) { return 0; }\n")],
    );
    lab.add_archive(
        "lab3.101.amy.1700000100.tgz",
        &[("lab3_101_amy/README", "forgot the code\n")],
    );

    let mut operator = ScriptedOperator::new();
    let outcome = run_batch(&lab.config(far_future()), runner(), &mut operator, &NeverStop).unwrap();

    assert!(!outcome.interrupted);
    assert!(outcome.skipped.is_empty());
    let handles: Vec<_> = outcome.records.iter().map(|r| r.handle()).collect();
    assert_eq!(handles, vec!["amy", "jdoe"]);

    let amy = &outcome.records[0];
    assert_eq!(amy.score(), 0);
    assert_eq!(
        amy.notes(),
        &["Missing File: main.c", "Compilation Failed: test -f main.c"]
    );
    let jdoe = &outcome.records[1];
    assert_eq!(jdoe.score(), 2);
    assert!(jdoe.notes().is_empty());

    assert_eq!(operator.asked(), &["lab3_101_amy/main.c"]);
    assert_eq!(
        fs::read_to_string(lab.report()).unwrap(),
        "\nNetid     #GSs Style Notes\n\
         amy          0   N/A Missing File: main.c\n                     Compilation Failed: test -f main.c\n\
         jdoe         2   N/A \n"
    );
    assert_eq!(lab.workspace_entries(), BTreeSet::from(["helper.h".to_string()]));
}

#[test]
fn test_substituted_path_is_graded() {
    let lab = LabFixture::new(TWO_CORRECT);
    lab.add_archive(
        "lab3.101.jdoe.1700000000.tgz",
        &[("jdoe/lab3/main.c", "int main(void) { return 0; }\n")],
    );

    let mut operator = ScriptedOperator::new()
        .with_resolution(PathResolution::Substitute("jdoe/lab3/main.c".to_string()));
    let outcome = run_batch(&lab.config(far_future()), runner(), &mut operator, &NeverStop).unwrap();

    assert_eq!(outcome.records[0].score(), 2);
    assert!(outcome.records[0].notes().is_empty());
}

#[test]
fn test_hanging_verifier_times_out_without_residue() {
    let lab = LabFixture::new("");
    let pid_file = lab.root().join("verifier.pid");
    lab.script(
        "gradeall",
        &format!("sleep 60 &\necho $! > '{}'\nwait", pid_file.display()),
    );
    lab.add_archive(
        "lab3.101.jdoe.1700000000.tgz",
        &[("lab3_101_jdoe/main.c", "int main;\n")],
    );

    let mut config = lab.config(far_future());
    config.aggregate_timeout_secs = 2;
    let started = Instant::now();
    let outcome = run_batch(&config, runner(), &mut ScriptedOperator::new(), &NeverStop).unwrap();

    assert!(started.elapsed() < Duration::from_secs(30));
    let record = &outcome.records[0];
    assert_eq!(record.score(), 0);
    assert_eq!(record.notes(), &["Timed Out"]);

    let pid: i32 = fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while process_is_running(pid) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(!process_is_running(pid), "verifier child {} survived", pid);
}

#[test]
fn test_problem_subset_runs_in_order() {
    let lab = LabFixture::new(TWO_CORRECT);
    let order_file = lab.root().join("order.txt");
    lab.script(
        "gradescript",
        &format!(
            "echo $1 >> '{}'\nif [ \"$1\" = 4 ]; then sleep 60; fi\necho \"Problem $1 is correct.\"",
            order_file.display()
        ),
    );
    lab.add_archive(
        "lab3.101.jdoe.1700000000.tgz",
        &[("lab3_101_jdoe/main.c", "int main;\n")],
    );

    let mut config = lab.config(far_future());
    config.problems = Some(ProblemSet::parse("3,1-2,4").unwrap());
    config.problem_timeout_secs = 1;
    let outcome = run_batch(&config, runner(), &mut ScriptedOperator::new(), &NeverStop).unwrap();

    let record = &outcome.records[0];
    assert_eq!(record.score(), 3);
    assert_eq!(record.notes(), &["Problem 4 Timed Out"]);
    assert_eq!(fs::read_to_string(&order_file).unwrap(), "3\n1\n2\n4\n");
}

#[test]
fn test_late_submission_note() {
    let lab = LabFixture::new(TWO_CORRECT);
    let name = "lab3.101.jdoe.1700000000.tgz";
    lab.add_archive(name, &[("lab3_101_jdoe/main.c", "int main;\n")]);

    let submitted = ArchiveIdentity::parse(name).unwrap().submitted_at().unwrap();
    let due = submitted - ChronoDuration::days(1) - ChronoDuration::hours(2);
    let outcome = run_batch(&lab.config(due), runner(), &mut ScriptedOperator::new(), &NeverStop).unwrap();

    assert_eq!(
        outcome.records[0].notes(),
        &["Late Submission: 1 days, 2.00 hours"]
    );
}

#[test]
fn test_workspace_isolated_between_submissions() {
    // Passes only if no earlier submission left leak.txt behind
    let lab = LabFixture::new(
        "if [ -f leak.txt ]; then echo leaked; else echo 'Problem 1 is correct.'; fi\ntouch leak.txt\necho clobbered > helper.h",
    );
    for student in ["amy", "bob", "cat"] {
        let entry = format!("lab3_101_{}/main.c", student);
        lab.add_archive(
            &format!("lab3.101.{}.1700000000.tgz", student),
            &[(entry.as_str(), "int main;\n")],
        );
    }

    let outcome = run_batch(&lab.config(far_future()), runner(), &mut ScriptedOperator::new(), &NeverStop).unwrap();

    let scores: Vec<_> = outcome.records.iter().map(|r| r.score()).collect();
    assert_eq!(scores, vec![1, 1, 1]);
    assert_eq!(lab.workspace_entries(), BTreeSet::from(["helper.h".to_string()]));
    assert_eq!(
        fs::read_to_string(lab.workspace().join("helper.h")).unwrap(),
        "#define N 4\n"
    );
}

#[test]
fn test_bad_archives_are_skipped() {
    let lab = LabFixture::new(TWO_CORRECT);
    lab.add_archive(
        "lab3.101.jdoe.1700000000.tgz",
        &[("lab3_101_jdoe/main.c", "int main;\n")],
    );
    lab.add_archive("badname.tgz", &[("x", "y")]);
    fs::write(lab.archives().join("lab3.101.eve.1700000000.tgz"), "not gzip").unwrap();

    let outcome = run_batch(&lab.config(far_future()), runner(), &mut ScriptedOperator::new(), &NeverStop).unwrap();

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].handle(), "jdoe");
    let mut skipped: Vec<_> = outcome.skipped.iter().map(|(name, _)| name.as_str()).collect();
    skipped.sort();
    assert_eq!(skipped, vec!["badname.tgz", "lab3.101.eve.1700000000.tgz"]);
}

#[test]
fn test_latest_submission_wins() {
    let lab = LabFixture::new("echo 'Problem 1 is correct.'\n[ -f second ] && echo 'Problem 2 is correct.'\ntrue");
    let mut config = lab.config(far_future());
    config.source_files = vec!["main.c".to_string(), "second".to_string()];
    lab.add_archive(
        "lab3.101.jdoe.1700000000.tgz",
        &[("lab3_101_jdoe/main.c", "v1\n"), ("lab3_101_jdoe/second", "x\n")],
    );
    lab.add_archive(
        "lab3.101.jdoe.1700000500.tgz",
        &[("lab3_101_jdoe/main.c", "v2\n")],
    );

    let outcome = run_batch(&config, runner(), &mut ScriptedOperator::new(), &NeverStop).unwrap();

    assert_eq!(outcome.records.len(), 1);
    let record = &outcome.records[0];
    assert_eq!(record.score(), 1);
    assert_eq!(record.notes(), &["Missing File: second"]);
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].0, "lab3.101.jdoe.1700000000.tgz");
}

#[test]
fn test_interrupt_stops_before_grading() {
    let lab = LabFixture::new(TWO_CORRECT);
    lab.add_archive(
        "lab3.101.jdoe.1700000000.tgz",
        &[("lab3_101_jdoe/main.c", "int main;\n")],
    );

    let stop = AtomicBool::new(true);
    let outcome = run_batch(&lab.config(far_future()), runner(), &mut ScriptedOperator::new(), &stop).unwrap();

    assert!(outcome.interrupted);
    assert!(outcome.records.is_empty());
    assert_eq!(lab.workspace_entries(), BTreeSet::from(["helper.h".to_string()]));
    assert_eq!(
        fs::read_to_string(lab.report()).unwrap(),
        "\nNetid     #GSs Style Notes\n"
    );
}
