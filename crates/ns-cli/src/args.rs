use std::path::PathBuf;

use clap::Parser;

/// Command-line surface for the New Solar front end driver.
#[derive(Parser, Debug)]
#[command(name = "nsc", version, about = "New Solar front end: lex, parse, build symbols, check, emit")]
pub struct CliArgs {
    /// Source files to compile.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output directory for generated assembly (default: current directory).
    #[arg(short = 'd', long = "out-dir", default_value = ".")]
    pub out_dir: PathBuf,

    /// Emit every diagnostic, including debug-level trace.
    #[arg(long, group = "verbosity")]
    pub debug: bool,

    /// Emit info-level diagnostics in addition to warnings and errors.
    #[arg(short = 'v', group = "verbosity")]
    pub verbose: bool,

    /// Suppress warnings; only errors are reported.
    #[arg(long = "woff", group = "verbosity")]
    pub woff: bool,

    /// Reserved options, unused by the core pipeline.
    #[arg(short = 'f', value_name = "OPT")]
    pub reserved: Vec<String>,
}

impl CliArgs {
    pub fn min_severity(&self) -> ns_common::diagnostics::Severity {
        use ns_common::diagnostics::Severity;
        if self.debug {
            Severity::Debug
        } else if self.verbose {
            Severity::Info
        } else if self.woff {
            Severity::Error
        } else {
            Severity::Warn
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ns_common::diagnostics::Severity;

    #[test]
    fn default_verbosity_is_warn() {
        let args = CliArgs::parse_from(["nsc", "a.ns"]);
        assert_eq!(args.min_severity(), Severity::Warn);
    }

    #[test]
    fn debug_flag_lowers_the_floor_to_debug() {
        let args = CliArgs::parse_from(["nsc", "--debug", "a.ns"]);
        assert_eq!(args.min_severity(), Severity::Debug);
    }

    #[test]
    fn woff_raises_the_floor_to_error() {
        let args = CliArgs::parse_from(["nsc", "--woff", "a.ns"]);
        assert_eq!(args.min_severity(), Severity::Error);
    }

    #[test]
    fn verbosity_flags_are_mutually_exclusive() {
        let result = CliArgs::try_parse_from(["nsc", "--debug", "-v", "a.ns"]);
        assert!(result.is_err());
    }

    #[test]
    fn out_dir_defaults_to_the_current_directory() {
        let args = CliArgs::parse_from(["nsc", "a.ns"]);
        assert_eq!(args.out_dir, PathBuf::from("."));
    }
}
