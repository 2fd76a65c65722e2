use anyhow::{bail, Context, Result};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// File-based lock serializing mutating runs against one stack.
pub struct FileLock {
    lock_path: PathBuf,
}

impl FileLock {
    /// Acquire the lock for `stack`. Fails if another process holds it.
    pub fn acquire(working_dir: &Path, stack: &str) -> Result<Self> {
        let lock_dir = working_dir.join("locks");
        fs::create_dir_all(&lock_dir)
            .with_context(|| format!("Failed to create lock directory {}", lock_dir.display()))?;
        let lock_path = lock_dir.join(format!("{}.lock", stack));

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                bail!(
                    "Stack '{}' is locked. Another process may be running (lock file: {}).",
                    stack,
                    lock_path.display()
                );
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to create lock {}", lock_path.display()))
            }
        };

        write!(
            file,
            "pid={}\ntime={}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        )?;

        Ok(Self { lock_path })
    }

    /// Release the lock file.
    pub fn release(self) -> Result<()> {
        if self.lock_path.exists() {
            fs::remove_file(&self.lock_path)?;
        }
        Ok(())
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}
