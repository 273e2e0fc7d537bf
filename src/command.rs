//! Copy form validation and cppp command-line construction.
//!
//! This is the caller side of the controller: by the time a `RunRequest` leaves this
//! module the executable has been resolved and every field has been checked.

use crate::error::{FormError, ResolveError};
use crate::model::RunRequest;
use crate::resolver;
use serde::{Deserialize, Serialize};

/// Thread counts above this still run but get a warning.
pub const PARTS_WARN_THRESHOLD: u32 = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CopyMode {
    #[default]
    Copy,
    Move,
}

impl CopyMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CopyMode::Copy => "copy",
            CopyMode::Move => "move",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            CopyMode::Copy => CopyMode::Move,
            CopyMode::Move => CopyMode::Copy,
        }
    }
}

/// Raw form values, as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyForm {
    pub mode: CopyMode,
    pub input: String,
    pub output: String,
    pub parts: String,
    pub verbose: bool,
    pub force: bool,
    pub checksum: bool,
}

/// Checked options for one cppp invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOptions {
    pub mode: CopyMode,
    pub input: String,
    pub output: String,
    pub parts: Option<u32>,
    pub verbose: bool,
    pub force: bool,
    pub checksum: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validated {
    pub options: CopyOptions,
    pub warnings: Vec<String>,
}

impl CopyForm {
    pub fn validate(&self) -> Result<Validated, FormError> {
        let input = self.input.trim();
        if input.is_empty() {
            return Err(FormError::EmptyInput);
        }
        let output = self.output.trim();
        if output.is_empty() {
            return Err(FormError::EmptyOutput);
        }

        let mut warnings = Vec::new();
        let parts = match self.parts.trim() {
            "" => None,
            raw => {
                let n: i64 = raw
                    .parse()
                    .map_err(|_| FormError::InvalidParts(raw.to_string()))?;
                if n < 1 {
                    return Err(FormError::PartsTooLow);
                }
                let n = u32::try_from(n).map_err(|_| FormError::InvalidParts(raw.to_string()))?;
                if n > PARTS_WARN_THRESHOLD {
                    warnings.push(format!(
                        "{n} threads may hurt performance; 4-20 is recommended"
                    ));
                }
                Some(n)
            }
        };

        Ok(Validated {
            options: CopyOptions {
                mode: self.mode,
                input: input.to_string(),
                output: output.to_string(),
                parts,
                verbose: self.verbose,
                force: self.force,
                checksum: self.checksum,
            },
            warnings,
        })
    }
}

impl CopyOptions {
    /// Flags in the order cppp documents them: `-m`, `-i`, `-o`, `-p`, `-v`, `-f`, `-c`.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.mode != CopyMode::Copy {
            args.extend(["-m".to_string(), self.mode.as_str().to_string()]);
        }
        args.extend(["-i".to_string(), self.input.clone()]);
        args.extend(["-o".to_string(), self.output.clone()]);
        if let Some(parts) = self.parts {
            args.extend(["-p".to_string(), parts.to_string()]);
        }
        if self.verbose {
            args.push("-v".into());
        }
        if self.force {
            args.push("-f".into());
        }
        if self.checksum {
            args.push("-c".into());
        }
        args
    }
}

/// Resolve the executable and assemble the request handed to the controller.
pub fn build_request<S: AsRef<str>>(
    candidates: &[S],
    options: &CopyOptions,
) -> Result<RunRequest, ResolveError> {
    let program = resolver::resolve(candidates)?;
    Ok(RunRequest::new(program, options.to_args()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(input: &str, output: &str, parts: &str) -> CopyForm {
        CopyForm {
            input: input.into(),
            output: output.into(),
            parts: parts.into(),
            ..Default::default()
        }
    }

    #[test]
    fn minimal_copy_omits_mode_and_parts() {
        let v = form(" src.txt ", "/dst/", "").validate().unwrap();
        assert_eq!(v.options.to_args(), ["-i", "src.txt", "-o", "/dst/"]);
        assert!(v.warnings.is_empty());
    }

    #[test]
    fn move_with_all_flags_keeps_documented_order() {
        let mut f = form("/src", "/backup", "20");
        f.mode = CopyMode::Move;
        f.verbose = true;
        f.force = true;
        f.checksum = true;
        let args = f.validate().unwrap().options.to_args();
        assert_eq!(
            args,
            ["-m", "move", "-i", "/src", "-o", "/backup", "-p", "20", "-v", "-f", "-c"]
        );
    }

    #[test]
    fn empty_paths_are_rejected() {
        assert_eq!(form("  ", "/dst", "").validate(), Err(FormError::EmptyInput));
        assert_eq!(form("a", "", "").validate(), Err(FormError::EmptyOutput));
    }

    #[test]
    fn parts_must_be_a_positive_number() {
        assert_eq!(
            form("a", "b", "four").validate(),
            Err(FormError::InvalidParts("four".into()))
        );
        assert_eq!(form("a", "b", "0").validate(), Err(FormError::PartsTooLow));
        assert_eq!(form("a", "b", "-3").validate(), Err(FormError::PartsTooLow));
    }

    #[test]
    fn high_thread_count_warns_but_passes() {
        let v = form("a", "b", "64").validate().unwrap();
        assert_eq!(v.options.parts, Some(64));
        assert_eq!(v.warnings.len(), 1);
        assert!(form("a", "b", "50").validate().unwrap().warnings.is_empty());
    }

    #[test]
    fn build_request_uses_resolved_program() {
        let opts = form("a", "b", "").validate().unwrap().options;
        let req = build_request(&["/missing/cppp", "cppp"], &opts).unwrap();
        assert_eq!(req.program, std::path::PathBuf::from("cppp"));
        assert_eq!(req.args, ["-i", "a", "-o", "b"]);
    }

    #[test]
    fn build_request_reports_unresolved_binary() {
        let opts = form("a", "b", "").validate().unwrap().options;
        assert!(matches!(
            build_request(&["/missing/cppp"], &opts),
            Err(ResolveError::NotFound(_))
        ));
    }
}
