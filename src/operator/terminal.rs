use crate::config::types::{GradeError, Result};
use crate::operator::{ManualReviewer, MissingPathResolver, PathResolution, Review};
use crate::report;
use crate::submission::record::{StyleScore, SubmissionRecord};
use std::io::{BufRead, Write};
use std::path::Path;
use std::process::Command;

/// Typed in place of a file name to give up on a missing file
pub const SKIP_SENTINEL: &str = "NONE";

/// Line-oriented operator prompts over any reader/writer pair
pub struct TerminalOperator<R, W> {
    input: R,
    output: W,
    pager: Vec<String>,
}

impl TerminalOperator<std::io::StdinLock<'static>, std::io::Stdout> {
    /// Prompt on the process's own terminal
    pub fn stdio(pager: &str) -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout(), pager)
    }
}

impl<R: BufRead, W: Write> TerminalOperator<R, W> {
    /// `pager` is split on whitespace; an empty pager prints files inline
    pub fn new(input: R, output: W, pager: &str) -> Self {
        Self {
            input,
            output,
            pager: pager.split_whitespace().map(str::to_string).collect(),
        }
    }

    /// Print `prompt` and read one line; `None` at end of input
    fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn show_file(&mut self, path: &Path) -> Result<()> {
        if let Some((program, args)) = self.pager.split_first() {
            let status = Command::new(program).args(args).arg(path).status().map_err(|e| {
                GradeError::Process(format!("Failed to start pager '{}': {}", program, e))
            })?;
            if !status.success() {
                log::warn!("pager exited with {} for {}", status, path.display());
            }
            return Ok(());
        }

        let contents = std::fs::read(path)?;
        writeln!(self.output, "==> {} <==", path.display())?;
        self.output.write_all(&contents)?;
        writeln!(self.output)?;
        Ok(())
    }
}

impl<R: BufRead, W: Write> MissingPathResolver for TerminalOperator<R, W> {
    fn resolve_missing(
        &mut self,
        archive: &str,
        expected: &str,
        listing: &[String],
    ) -> Result<PathResolution> {
        writeln!(self.output, "'{}' not found in {}", expected, archive)?;
        for entry in listing {
            writeln!(self.output, "{}", entry)?;
        }

        match self.ask(&format!("Enter file name or {}> ", SKIP_SENTINEL))? {
            None => Ok(PathResolution::Skip),
            Some(answer) if answer.trim() == SKIP_SENTINEL => Ok(PathResolution::Skip),
            Some(answer) if answer.trim().is_empty() => Ok(PathResolution::Skip),
            Some(answer) => Ok(PathResolution::Substitute(answer.trim().to_string())),
        }
    }
}

impl<R: BufRead, W: Write> ManualReviewer for TerminalOperator<R, W> {
    fn review(&mut self, record: &SubmissionRecord) -> Result<Review> {
        write!(self.output, "{}", report::render_row(record))?;
        if self.ask("<Press Enter to view files>")?.is_none() {
            return Ok(Review::default());
        }

        let mut files: Vec<_> = match std::fs::read_dir(record.dir()) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.is_file())
                .collect(),
            Err(e) => {
                log::warn!("cannot list {}: {}", record.dir().display(), e);
                Vec::new()
            }
        };
        files.sort();
        for file in &files {
            self.show_file(file)?;
        }

        let style = match self.ask("Style Points: ")? {
            Some(points) if !points.trim().is_empty() => StyleScore::Graded(points.trim().to_string()),
            _ => StyleScore::NotGraded,
        };

        let mut notes = Vec::new();
        while let Some(note) = self.ask("Notes: ")? {
            if note.is_empty() {
                break;
            }
            notes.push(note);
        }

        Ok(Review { style, notes })
    }
}
