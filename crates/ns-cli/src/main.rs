use clap::Parser;
use ns_cli::{run, CliArgs};

fn main() {
    let args = CliArgs::parse();

    let level = match args.min_severity() {
        ns_common::diagnostics::Severity::Debug => tracing::Level::DEBUG,
        ns_common::diagnostics::Severity::Info => tracing::Level::INFO,
        ns_common::diagnostics::Severity::Warn => tracing::Level::WARN,
        ns_common::diagnostics::Severity::Error | ns_common::diagnostics::Severity::Fatal => tracing::Level::ERROR,
    };
    tracing_subscriber::fmt().with_max_level(level).without_time().init();

    std::process::exit(run(&args));
}
