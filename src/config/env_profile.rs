//! `.env` profile switching: copy `.env.<profile>` over `.env`.

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Profiles that can be switched to.
pub const PROFILES: [&str; 3] = ["granite", "optimized", "generic"];

#[derive(Debug, PartialEq)]
pub enum SwitchOutcome {
    /// `.env.<profile>` was copied to `.env`.
    Switched {
        profile: String,
        source: PathBuf,
        current_model: String,
    },
    /// A known profile whose `.env.<profile>` does not exist; `.env` untouched.
    Missing {
        profile: String,
        source: PathBuf,
        current_model: String,
    },
    /// No recognised profile given; `.env` untouched.
    Usage { current_model: String },
}

pub fn usage_text() -> String {
    format!(
        "Usage: omni env [{}]\n\n  granite    - IBM Granite models via Ollama\n  optimized  - tuned local model mix\n  generic    - general-purpose defaults",
        PROFILES.join("|")
    )
}

/// Switch the `.env` file in `dir` to the named profile.
///
/// Unknown or missing profile names leave `.env` alone and report the
/// current `FILE_EDITOR_MODEL`. Only a failed copy is an error.
pub fn switch_profile(dir: &Path, profile: Option<&str>) -> Result<SwitchOutcome, ConfigError> {
    let Some(profile) = profile.filter(|p| PROFILES.contains(p)) else {
        return Ok(SwitchOutcome::Usage {
            current_model: current_file_editor_model(dir),
        });
    };

    let source = dir.join(format!(".env.{profile}"));
    if !source.is_file() {
        tracing::warn!(profile, path = %source.display(), "Profile file not found");
        return Ok(SwitchOutcome::Missing {
            profile: profile.to_string(),
            source,
            current_model: current_file_editor_model(dir),
        });
    }

    std::fs::copy(&source, dir.join(".env"))?;
    tracing::info!(profile, "Switched .env profile");

    Ok(SwitchOutcome::Switched {
        profile: profile.to_string(),
        source,
        current_model: current_file_editor_model(dir),
    })
}

/// What `omni env` prints for `outcome`.
pub fn report(outcome: &SwitchOutcome) -> String {
    match outcome {
        SwitchOutcome::Switched {
            profile,
            source,
            current_model,
        } => format!(
            "Switched to {profile} profile ({} -> .env)\nFILE_EDITOR_MODEL={current_model}",
            source.display()
        ),
        SwitchOutcome::Missing {
            source,
            current_model,
            ..
        } => format!(
            "{} not found, .env unchanged\n\n{}\n\nCurrent FILE_EDITOR_MODEL: {current_model}",
            source.display(),
            usage_text()
        ),
        SwitchOutcome::Usage { current_model } => {
            format!("{}\n\nCurrent FILE_EDITOR_MODEL: {current_model}", usage_text())
        }
    }
}

/// The `FILE_EDITOR_MODEL` value from `dir/.env`: the text after the first
/// `=` up to the next one on the first matching line. Empty when the key or
/// the file is missing.
pub fn current_file_editor_model(dir: &Path) -> String {
    let Ok(contents) = std::fs::read_to_string(dir.join(".env")) else {
        return String::new();
    };

    contents
        .lines()
        .find(|line| line.starts_with("FILE_EDITOR_MODEL="))
        .and_then(|line| line.split('=').nth(1))
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_profile_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let body = b"FILE_EDITOR_MODEL=ollama:granite3.1-dense:8b\nDEBUG=false\n";
        std::fs::write(dir.path().join(".env.granite"), body).unwrap();
        std::fs::write(dir.path().join(".env"), "OLD=1\n").unwrap();

        let outcome = switch_profile(dir.path(), Some("granite")).unwrap();
        assert!(matches!(outcome, SwitchOutcome::Switched { ref profile, .. } if profile == "granite"));
        assert_eq!(std::fs::read(dir.path().join(".env")).unwrap(), body);
        assert!(report(&outcome).ends_with("FILE_EDITOR_MODEL=ollama:granite3.1-dense:8b"));
    }

    #[test]
    fn unknown_profile_leaves_env_untouched() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "FILE_EDITOR_MODEL=gpt-4o\n").unwrap();
        std::fs::write(dir.path().join(".env.turbo"), "X=1\n").unwrap();

        for arg in [None, Some("turbo")] {
            let outcome = switch_profile(dir.path(), arg).unwrap();
            assert_eq!(
                outcome,
                SwitchOutcome::Usage {
                    current_model: "gpt-4o".into()
                }
            );
        }
        assert_eq!(
            std::fs::read_to_string(dir.path().join(".env")).unwrap(),
            "FILE_EDITOR_MODEL=gpt-4o\n"
        );
    }

    #[test]
    fn current_model_empty_without_env() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(current_file_editor_model(dir.path()), "");

        std::fs::write(dir.path().join(".env"), "DEBUG=true\n").unwrap();
        assert_eq!(current_file_editor_model(dir.path()), "");
    }

    #[test]
    fn missing_profile_source_keeps_env_and_shows_usage() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "FILE_EDITOR_MODEL=ollama:mistral\n").unwrap();

        let outcome = switch_profile(dir.path(), Some("generic")).unwrap();
        assert!(matches!(outcome, SwitchOutcome::Missing { ref profile, .. } if profile == "generic"));
        let text = report(&outcome);
        assert!(text.contains(".env.generic not found"));
        assert!(text.contains(&usage_text()));
        assert!(text.ends_with("Current FILE_EDITOR_MODEL: ollama:mistral"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join(".env")).unwrap(),
            "FILE_EDITOR_MODEL=ollama:mistral\n"
        );
    }
}
