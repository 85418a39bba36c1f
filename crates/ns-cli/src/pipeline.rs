use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ns_checker::check_module;
use ns_codegen::{CodeGenerator, NullGenerator};
use ns_common::config::Config;
use ns_common::diagnostics::{Diagnostics, Severity};
use ns_parser::parse_module;
use ns_symbols::build_symbols;

/// Runs lex -> parse -> build-symbols -> check -> codegen for one file in
/// strict sequence, stopping at the first stage that fails. Returns the
/// diagnostics accumulated along the way and, on full success, the lines of
/// assembly to write.
pub struct FileOutcome {
    pub diagnostics: Diagnostics,
    pub assembly: Option<Vec<String>>,
}

pub fn compile_file(source: &str, config: Config, min_severity: Severity) -> FileOutcome {
    let mut diags = Diagnostics::with_min_severity(min_severity);

    let (mut arena, root) = match parse_module(source, config, &mut diags) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::error!(phase = "parse", "{e}");
            return FileOutcome { diagnostics: diags, assembly: None };
        }
    };
    if !diags.success() {
        return FileOutcome { diagnostics: diags, assembly: None };
    }

    let mut table = match build_symbols(&mut arena, root, &mut diags) {
        Ok(table) => table,
        Err(e) => {
            tracing::error!(phase = "symbols", "{e}");
            return FileOutcome { diagnostics: diags, assembly: None };
        }
    };
    if !diags.success() {
        return FileOutcome { diagnostics: diags, assembly: None };
    }

    if let Err(e) = check_module(&mut arena, &mut table, &config, root, &mut diags) {
        tracing::error!(phase = "check", "{e}");
        return FileOutcome { diagnostics: diags, assembly: None };
    }
    if !diags.success() {
        return FileOutcome { diagnostics: diags, assembly: None };
    }

    let mut codegen = NullGenerator::new();
    codegen.visit(&arena, &table, root);
    if !codegen.success() {
        return FileOutcome { diagnostics: diags, assembly: None };
    }

    FileOutcome { diagnostics: diags, assembly: Some(codegen.to_assembly()) }
}

/// Compiles one input file on disk, writing `out_dir/<stem>.s` only if the
/// whole pipeline succeeds. Returns whether the file succeeded; failure is
/// reported through `diagnostics` plus a `tracing` error event, never by
/// partial output.
pub fn compile_path(input: &Path, out_dir: &Path, config: Config, min_severity: Severity) -> Result<bool> {
    let _span = tracing::info_span!("file", path = %input.display()).entered();

    let source = fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let outcome = compile_file(&source, config, min_severity);

    for record in outcome.diagnostics.records() {
        match record.severity {
            Severity::Debug => tracing::debug!("{record}"),
            Severity::Info => tracing::info!("{record}"),
            Severity::Warn => tracing::warn!("{record}"),
            Severity::Error | Severity::Fatal => tracing::error!("{record}"),
        }
    }

    match outcome.assembly {
        Some(lines) => {
            let out_path = output_path(input, out_dir);
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
            }
            fs::write(&out_path, join_lines(&lines)).with_context(|| format!("writing {}", out_path.display()))?;
            Ok(true)
        }
        None => {
            tracing::error!("compilation failed for {}", input.display());
            Ok(false)
        }
    }
}

fn output_path(input: &Path, out_dir: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default();
    out_dir.join(stem).with_extension("s")
}

fn join_lines(lines: &[String]) -> String {
    let mut text = lines.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_well_formed_file_compiles_to_placeholder_assembly() {
        let outcome = compile_file("func f() -> (int) { return 1; }\n", Config::default(), Severity::Warn);
        assert!(outcome.diagnostics.success());
        assert_eq!(outcome.assembly.unwrap(), vec!["; func f".to_string()]);
    }

    #[test]
    fn a_type_error_stops_the_pipeline_before_codegen() {
        let outcome = compile_file("func f() -> (int) { return 1q; }\n", Config::default(), Severity::Warn);
        assert!(!outcome.diagnostics.success());
        assert!(outcome.assembly.is_none());
    }

    #[test]
    fn a_parse_error_stops_the_pipeline_before_symbols() {
        let outcome = compile_file("func f(", Config::default(), Severity::Warn);
        assert!(!outcome.diagnostics.success());
        assert!(outcome.assembly.is_none());
    }

    #[test]
    fn compile_path_writes_an_s_file_named_after_the_input_stem() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("hello.ns");
        fs::write(&input, "func f() -> (int) { return 1; }\n").unwrap();

        let ok = compile_path(&input, dir.path(), Config::default(), Severity::Warn).unwrap();
        assert!(ok);
        assert!(dir.path().join("hello.s").exists());
    }

    #[test]
    fn compile_path_writes_nothing_when_the_pipeline_fails() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bad.ns");
        fs::write(&input, "func f() -> (int) { return 1q; }\n").unwrap();

        let ok = compile_path(&input, dir.path(), Config::default(), Severity::Warn).unwrap();
        assert!(!ok);
        assert!(!dir.path().join("bad.s").exists());
    }
}
