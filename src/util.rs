use std::fmt;
use std::fs;
use std::io::{self, BufRead, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::Rng;
use termion::input::TermRead;
use tracing::{debug, warn};
use zeroize::Zeroize;

use crate::consts::ALNUM;
use crate::error::KptagError;

/// A database passphrase. Wiped from memory when dropped and never shown by
/// `Debug`.
pub struct Password(String);

impl Password {
    pub fn new<S>(password: S) -> Self
    where
        S: Into<String>,
    {
        Password(password.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Drop for Password {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Password(..)")
    }
}

/// Asks for the passphrase of `database` without echoing it. When stdin is
/// not a terminal, the first line of stdin is used instead.
pub fn prompt_password<P>(database: P) -> Result<Password>
where
    P: AsRef<Path>,
{
    let database = database.as_ref();
    let stdin = io::stdin();

    if !termion::is_tty(&stdin) {
        debug!("stdin is not a tty, reading password from it");
        let mut line = String::new();
        if BufRead::read_line(&mut stdin.lock(), &mut line)? == 0 {
            return Err(KptagError::UserAbort.into());
        }
        let len = line.trim_end_matches(&['\r', '\n'][..]).len();
        line.truncate(len);

        return Ok(Password::new(line));
    }

    let stdout = io::stdout();
    let mut stdout = stdout.lock();
    let mut stdin = stdin.lock();

    write!(stdout, "Enter password to unlock {}: ", database.display())?;
    stdout.flush()?;
    let password = stdin.read_passwd(&mut stdout)?;
    writeln!(stdout)?;

    match password {
        Some(password) => Ok(Password::new(password)),
        None => Err(KptagError::UserAbort.into()),
    }
}

/// Fails if `output` exists, unless overwriting was asked for.
pub fn ensure_output_free<P>(output: P, force: bool) -> Result<()>
where
    P: AsRef<Path>,
{
    let output = output.as_ref();

    if fs::symlink_metadata(output).is_ok() {
        if !force {
            return Err(KptagError::OutputExists(output.to_path_buf()).into());
        }
        warn!(output = %output.display(), "output exists and will be overwritten");
    }

    Ok(())
}

/// A private directory for plaintext intermediates:
/// `<tmpdir>/<exe>.<20 random alnum chars>/`, mode 0700. Removed, with
/// everything in it, when dropped.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn new<P>(tmpdir: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let tmpdir = tmpdir.as_ref();
        if !tmpdir.is_dir() {
            return Err(KptagError::TempDirMissing(tmpdir.to_path_buf()).into());
        }

        let folder = generate_chars_from_set(ALNUM, 20);
        let path = tmpdir.join(format!("{}.{}", exe_name(), folder));
        fs::DirBuilder::new()
            .mode(0o700)
            .create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        debug!(path = %path.display(), "created scratch directory");

        Ok(ScratchDir { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `contents` to a new file `name` inside the directory.
    pub fn write(&self, name: &str, contents: &[u8]) -> Result<PathBuf> {
        let path = self.path.join(name);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        file.write_all(contents)?;

        Ok(path)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            warn!(path = %self.path.display(), "failed to remove scratch directory: {}", e);
        }
    }
}

/// Writes the filtered document to `<tmpdir>/<exe>-debug.xml` for
/// inspection. The file is left behind on purpose.
pub fn write_debug_export<P>(tmpdir: P, contents: &[u8]) -> Result<PathBuf>
where
    P: AsRef<Path>,
{
    let tmpdir = tmpdir.as_ref();
    if !tmpdir.is_dir() {
        return Err(KptagError::TempDirMissing(tmpdir.to_path_buf()).into());
    }

    let path = tmpdir.join(format!("{}-debug.xml", exe_name()));
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(contents)?;
    warn!(path = %path.display(), "wrote plaintext debug export");

    Ok(path)
}

/// A hidden, randomly named sibling of `output`: `<dir>/.<name>.<10 random
/// alnum chars>`. The new database is imported there and only renamed over
/// `output` once the import went through.
pub fn staging_path<P>(output: P) -> Result<PathBuf>
where
    P: AsRef<Path>,
{
    let output = output.as_ref();
    let name = output
        .file_name()
        .with_context(|| format!("{} does not name a file", output.display()))?;

    Ok(output.with_file_name(format!(
        ".{}.{}",
        name.to_string_lossy(),
        generate_chars_from_set(ALNUM, 10)
    )))
}

pub fn generate_chars_from_set<V>(set: V, len: usize) -> String
where
    V: AsRef<[u8]>,
{
    let set = set.as_ref();
    let mut rng = rand::thread_rng();

    (0..len)
        .map(|_| set[rng.gen_range(0..set.len())] as char)
        .collect()
}

fn exe_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.file_name().map(|name| name.to_string_lossy().into_owned()))
        .unwrap_or_else(|| String::from(env!("CARGO_PKG_NAME")))
}
