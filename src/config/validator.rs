// Startup validation of the grading configuration.
// Errors are always fatal: no submission is graded against a broken setup.

use crate::config::types::{GradeError, GradingConfig, Result};
use std::path::{Component, Path};

/// Validation result with detailed errors
#[derive(Debug)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Check the configuration without failing; callers decide what to do
pub fn check_config(config: &GradingConfig) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_timeouts(config, &mut result);
    validate_sources(config, &mut result);
    validate_lab_files(config, &mut result);
    validate_directories(config, &mut result);

    result
}

/// Validate config at startup and fail fast with every error collected
pub fn validate_config(config: &GradingConfig) -> Result<ValidationResult> {
    let result = check_config(config);

    for warning in &result.warnings {
        log::warn!("config: {}", warning);
    }

    if !result.is_valid() {
        return Err(GradeError::Config(format!(
            "Config validation failed:\n{}",
            result.errors.join("\n")
        )));
    }

    Ok(result)
}

fn validate_timeouts(config: &GradingConfig, result: &mut ValidationResult) {
    let budgets = [
        ("aggregate_timeout_secs", config.aggregate_timeout_secs),
        ("problem_timeout_secs", config.problem_timeout_secs),
        ("compile_timeout_secs", config.compile_timeout_secs),
    ];

    for (name, secs) in budgets {
        if secs == 0 {
            result.add_error(format!("{} must be at least 1 second", name));
        } else if secs > 3600 {
            result.add_warning(format!(
                "{} is {} seconds; a hung verifier will stall the batch that long",
                name, secs
            ));
        }
    }

    if config.problems.is_some() && config.problem_timeout_secs > config.aggregate_timeout_secs {
        result.add_warning(format!(
            "problem_timeout_secs ({}) exceeds aggregate_timeout_secs ({})",
            config.problem_timeout_secs, config.aggregate_timeout_secs
        ));
    }
}

fn validate_sources(config: &GradingConfig, result: &mut ValidationResult) {
    if config.source_files.is_empty() {
        result.add_error("source_files cannot be empty".to_string());
    }

    for source in &config.source_files {
        if !is_safe_relative(Path::new(source)) {
            result.add_error(format!(
                "source file '{}' must be a relative path without '..'",
                source
            ));
        }
    }

    if config.compile_commands.is_empty() {
        result.add_warning("compile_commands is empty; submissions are graded unbuilt".to_string());
    }

    if config.compile_commands.iter().any(|c| c.trim().is_empty()) {
        result.add_error("compile_commands contains an empty command".to_string());
    }

    if let Some(problems) = &config.problems {
        if problems.is_empty() {
            result.add_error("problems is present but lists no problem numbers".to_string());
        }
    }
}

fn validate_lab_files(config: &GradingConfig, result: &mut ValidationResult) {
    if !config.lab_path.is_dir() {
        result.add_error(format!(
            "lab_path is not a directory: {}",
            config.lab_path.display()
        ));
        return;
    }

    let verifier = if config.problems.is_some() {
        config.problem_verifier_path()
    } else {
        config.aggregate_verifier_path()
    };
    if !verifier.is_file() {
        result.add_error(format!("verifier not found: {}", verifier.display()));
    }

    for name in &config.common_files {
        let mut components = Path::new(name).components();
        let plain = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !plain {
            result.add_error(format!(
                "common file '{}' must be a plain file name inside lab_path",
                name
            ));
            continue;
        }

        if !config.lab_path.join(name).is_file() {
            result.add_error(format!(
                "common file '{}' not found in {}",
                name,
                config.lab_path.display()
            ));
        }
    }
}

fn validate_directories(config: &GradingConfig, result: &mut ValidationResult) {
    if !config.archive_dir.is_dir() {
        result.add_error(format!(
            "archive_dir is not a directory: {}",
            config.archive_dir.display()
        ));
    }

    if config.archive_extension.is_empty() || config.archive_extension.contains('.') {
        result.add_error(format!(
            "archive_extension '{}' must be a single non-empty field (archive names have exactly five dot-separated fields)",
            config.archive_extension
        ));
    }

    // The workspace is wiped on every run; it must never swallow inputs.
    let Ok(workspace) = config.workspace_dir.canonicalize() else {
        return;
    };
    let protected = [
        ("lab_path", &config.lab_path),
        ("archive_dir", &config.archive_dir),
        ("extract_dir", &config.extract_dir),
    ];
    for (name, path) in protected {
        if let Ok(path) = path.canonicalize() {
            if path.starts_with(&workspace) {
                result.add_error(format!(
                    "workspace_dir {} would delete {} ({})",
                    config.workspace_dir.display(),
                    name,
                    path.display()
                ));
            }
        }
    }
}

fn is_safe_relative(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
