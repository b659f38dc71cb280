//! Talking to `keepassxc-cli`, which does all of the decrypting and
//! encrypting.

use std::ffi::OsStr;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::consts::XML_MARKER;
use crate::error::KptagError;
use crate::util::Password;

/// Produces the plaintext XML export of an encrypted database.
pub trait Exporter {
    /// Returns everything the exporter printed; the document starts at the
    /// first XML declaration (see [`extract_document`]).
    fn export(&self, database: &Path, key_file: Option<&Path>, password: &Password)
        -> Result<Vec<u8>>;
}

/// Turns an XML export back into an encrypted database.
pub trait Importer {
    fn import(&self, xml: &Path, database: &Path, password: &Password) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct KeepassxcCli {
    binary: PathBuf,
}

impl KeepassxcCli {
    pub fn new<P>(binary: P) -> Self
    where
        P: Into<PathBuf>,
    {
        KeepassxcCli {
            binary: binary.into(),
        }
    }

    /// Runs the binary with `args`, writing each of `lines` to its stdin.
    fn run(&self, args: &[&OsStr], lines: &[&Password]) -> Result<Output> {
        let bin = self.binary.display().to_string();
        debug!(bin = %bin, ?args, "spawning");

        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn {}", bin))?;

        let stdin = child.stdin.take().context("stdin wasn't captured")?;
        feed(stdin, lines).with_context(|| format!("Failed to write to {}", bin))?;

        let output = child
            .wait_with_output()
            .with_context(|| format!("Failed to wait for {}", bin))?;
        debug!(status = %output.status, stderr = %String::from_utf8_lossy(&output.stderr).trim());

        Ok(output)
    }
}

impl Exporter for KeepassxcCli {
    fn export(
        &self,
        database: &Path,
        key_file: Option<&Path>,
        password: &Password,
    ) -> Result<Vec<u8>> {
        info!(database = %database.display(), "exporting");

        let mut args = vec![OsStr::new("export"), OsStr::new("--format"), OsStr::new("xml")];
        if let Some(key_file) = key_file {
            args.push(OsStr::new("--key-file"));
            args.push(key_file.as_os_str());
        }
        args.push(database.as_os_str());

        let output = self.run(&args, &[password])?;
        if !output.status.success() {
            // the missing document is reported by the caller
            warn!(
                status = %output.status,
                "keepassxc-cli export: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(output.stdout)
    }
}

impl Importer for KeepassxcCli {
    fn import(&self, xml: &Path, database: &Path, password: &Password) -> Result<()> {
        info!(database = %database.display(), "importing");

        // once for the password, once for the confirmation
        let args = [OsStr::new("import"), xml.as_os_str(), database.as_os_str()];
        let output = self.run(&args, &[password, password])?;

        if !output.status.success() {
            warn!(
                "keepassxc-cli import: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Err(KptagError::CommandFailed(
                format!("{} import", self.binary.display()),
                output.status,
            )
            .into());
        }

        Ok(())
    }
}

/// Writes each of `lines` to `stdin`, then closes it. A child that exits
/// without reading them is left to be judged by its exit status.
fn feed<W>(mut stdin: W, lines: &[&Password]) -> io::Result<()>
where
    W: Write,
{
    for line in lines {
        let written = stdin
            .write_all(line.as_bytes())
            .and_then(|()| stdin.write_all(b"\n"));

        match written {
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                debug!("stdin closed before the password was written");
                return Ok(());
            }
            other => other?,
        }
    }

    Ok(())
}

/// Cuts everything before the first `<?xml` out of the exporter's output.
/// The password prompt and any warnings end up there.
pub fn extract_document(output: &[u8]) -> Result<&[u8]> {
    output
        .windows(XML_MARKER.len())
        .position(|window| window == XML_MARKER)
        .map(|idx| &output[idx..])
        .ok_or_else(|| KptagError::NoXmlMarker.into())
}
