//! export → filter → import, one step after the other.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use crate::database::Document;
use crate::error::KptagError;
use crate::filter::{self, Filtered, TagSet};
use crate::keepassxc::{self, Exporter, Importer};
use crate::util::{self, Password, ScratchDir};

/// Everything a run needs to know, as given on the command line.
#[derive(Debug, Clone)]
pub struct Config {
    pub input: PathBuf,
    pub output: PathBuf,
    pub tags: TagSet,
    pub force: bool,
    pub tmpdir: PathBuf,
    pub key_file: Option<PathBuf>,
    pub debug_export: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub total_entries: usize,
    pub exported_entries: usize,
}

/// Runs the whole pipeline. `password` is only asked for once the output
/// path has been checked, and the importer is only invoked if at least one
/// entry survived filtering.
pub fn run<K, F>(config: &Config, keepassxc: &K, password: F) -> Result<Summary>
where
    K: Exporter + Importer,
    F: FnOnce() -> Result<Password>,
{
    util::ensure_output_free(&config.output, config.force)?;

    let password = password()?;

    let mut raw = keepassxc.export(&config.input, config.key_file.as_deref(), &password)?;
    let parsed = parse_export(&raw);
    raw.zeroize();
    let Filtered {
        mut document,
        total_entries,
        exported_entries,
    } = filter::filter(parsed?, &config.tags);

    let summary = Summary {
        total_entries,
        exported_entries,
    };
    info!(
        total = summary.total_entries,
        exported = summary.exported_entries,
        "filtered {}",
        config.input.display()
    );

    let xml = document.to_bytes();
    document.zeroize();
    let mut xml = xml?;

    if config.debug_export {
        if let Err(e) = util::write_debug_export(&config.tmpdir, &xml) {
            xml.zeroize();
            return Err(e);
        }
    }

    if summary.exported_entries == 0 {
        xml.zeroize();
        let tags = config.tags.iter().map(ToOwned::to_owned).collect();
        return Err(KptagError::NothingExported(tags).into());
    }

    let scratch = match ScratchDir::new(&config.tmpdir) {
        Ok(scratch) => scratch,
        Err(e) => {
            xml.zeroize();
            return Err(e);
        }
    };
    let written = scratch.write("filtered.xml", &xml);
    xml.zeroize();
    let xml_path = written?;

    // an existing output is only replaced once the new database is complete
    let staged = util::staging_path(&config.output)?;
    if let Err(e) = keepassxc.import(&xml_path, &staged, &password) {
        discard(&staged);
        return Err(e);
    }
    drop(scratch);

    if let Err(e) = fs::rename(&staged, &config.output) {
        discard(&staged);
        return Err(e).with_context(|| {
            format!(
                "Failed to move {} to {}",
                staged.display(),
                config.output.display()
            )
        });
    }
    debug!(output = %config.output.display(), "database written");

    Ok(summary)
}

/// Removes whatever a failed import left at `staged`.
fn discard(staged: &Path) {
    match fs::remove_file(staged) {
        Ok(()) => debug!(path = %staged.display(), "removed partial import"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %staged.display(), "failed to remove partial import: {}", e),
    }
}

fn parse_export(raw: &[u8]) -> Result<Document> {
    let xml = keepassxc::extract_document(raw)?;
    let xml = str::from_utf8(xml).map_err(|e| KptagError::MalformedDocument(e.to_string()))?;

    Document::parse(xml)
}
