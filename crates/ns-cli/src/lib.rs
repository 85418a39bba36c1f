//! Driver for the New Solar front end: resolves verbosity flags to a single
//! diagnostics floor, then runs lex -> parse -> build-symbols -> check ->
//! codegen per file, writing assembly only for files that fully succeed.

pub mod args;
pub mod pipeline;

pub use args::CliArgs;

use ns_common::config::Config;

/// Compiles every input in `args`, returning the process exit code: `0` if
/// every file succeeded, `1` if any file failed. A single file failing
/// never stops the rest of the batch.
pub fn run(args: &CliArgs) -> i32 {
    let config = Config::mercury_default();
    let min_severity = args.min_severity();

    let mut all_ok = true;
    for input in &args.inputs {
        match pipeline::compile_path(input, &args.out_dir, config, min_severity) {
            Ok(true) => {}
            Ok(false) => all_ok = false,
            Err(e) => {
                tracing::error!("{e:#}");
                all_ok = false;
            }
        }
    }

    if all_ok { 0 } else { 1 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn run_returns_zero_when_every_file_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("ok.ns");
        fs::write(&input, "func f() -> (int) { return 1; }\n").unwrap();

        let args = CliArgs { inputs: vec![input], out_dir: dir.path().to_path_buf(), debug: false, verbose: false, woff: false, reserved: vec![] };
        assert_eq!(run(&args), 0);
    }

    #[test]
    fn run_returns_nonzero_and_keeps_going_when_one_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.ns");
        let bad = dir.path().join("bad.ns");
        fs::write(&good, "func f() -> (int) { return 1; }\n").unwrap();
        fs::write(&bad, "func g() -> (int) { return 1q; }\n").unwrap();

        let args = CliArgs { inputs: vec![bad, good], out_dir: dir.path().to_path_buf(), debug: false, verbose: false, woff: false, reserved: vec![] };
        assert_eq!(run(&args), 1);
        assert!(dir.path().join("good.s").exists());
        assert!(!dir.path().join("bad.s").exists());
    }
}
