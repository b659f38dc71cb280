use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::consts::{KPTAG_KEEPASSXC_CLI, KPTAG_TMPDIR, VERSION};
use crate::keepassxc::KeepassxcCli;
use crate::pipeline::{self, Config};
use crate::util;

/// Copy the entries of a KeePassXC database that carry a tag into a new
/// database.
///
/// An entry is tagged when it has an additional attribute named after the
/// tag; the attribute's value does not matter. Groups left without entries
/// and the recycle bin are not copied.
#[derive(Debug, Parser)]
#[clap(term_width = 80, version = VERSION)]
struct Args {
    /// Tag to export (may be given multiple times)
    #[clap(long, short = 't', value_name = "TAG")]
    tag: Vec<String>,
    /// Overwrite the output database if it exists
    #[clap(long, short = 'f')]
    force: bool,
    /// Directory for the decrypted intermediate file; should be memory-backed
    #[clap(long, value_name = "DIR", parse(from_os_str), default_value = KPTAG_TMPDIR.as_str())]
    tmpdir: PathBuf,
    /// Path to the keepassxc-cli binary
    #[clap(long, value_name = "PATH", parse(from_os_str), default_value = KPTAG_KEEPASSXC_CLI.as_str())]
    keepassxc_cli: PathBuf,
    /// Key file to unlock the input database with
    #[clap(long, short = 'k', value_name = "FILE", parse(from_os_str))]
    key_file: Option<PathBuf>,
    /// More output per occurrence
    #[clap(long, short = 'v', parse(from_occurrences))]
    verbose: u8,
    /// Keep a plaintext copy of the filtered export in the tmpdir
    #[clap(long, hide = true)]
    debug_export: bool,
    /// Database to export from
    #[clap(parse(from_os_str))]
    input: PathBuf,
    /// Database to create
    #[clap(parse(from_os_str))]
    output: PathBuf,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Config {
            input: args.input,
            output: args.output,
            tags: args.tag.into_iter().collect(),
            force: args.force,
            tmpdir: args.tmpdir,
            key_file: args.key_file,
            debug_export: args.debug_export,
        }
    }
}

pub fn opt() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    debug!(?args);

    let keepassxc = KeepassxcCli::new(&args.keepassxc_cli);
    let config = Config::from(args);

    let summary = pipeline::run(&config, &keepassxc, || {
        util::prompt_password(&config.input)
    })?;

    println!(
        "Exported {} of {} entries to {}",
        summary.exported_entries,
        summary.total_entries,
        config.output.display()
    );

    Ok(())
}

/// `-v` info, `-vv` debug, `-vvv` trace. Without `-v`, `RUST_LOG` decides,
/// defaulting to warnings only.
fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
