use std::path::PathBuf;

use clap::Parser;

/// Verify that one or more problem packages are internally consistent.
#[derive(Parser, Debug)]
#[command(name = "probver", about = "Problem package verification engine")]
pub struct Opt {
    /// Set log level (debug, info, warning, error, critical)
    #[arg(short = 'l', long = "log-level", default_value = "warning")]
    pub log_level: String,

    /// Bail verification on first error (useful together with debug output)
    #[arg(short = 'b', long = "bail-on-error")]
    pub bail_on_error: bool,

    /// Only run the given aspects (config, statement, input_validators, output_validators,
    /// graders, testdata, submissions). Defaults to all of them.
    #[arg(long = "items", value_delimiter = ',')]
    pub items: Vec<String>,

    /// Increase verbosity; repeatable. Overrides --log-level when given.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Skip PDF/HTML statement conversion (no `problem2pdf`/`problem2html` toolchain required).
    #[arg(long = "no-statement-conversion")]
    pub no_statement_conversion: bool,

    /// Directories of the problems to verify
    #[arg(required = true)]
    pub problems: Vec<PathBuf>,
}
