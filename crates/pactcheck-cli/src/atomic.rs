use std::fs::{OpenOptions, create_dir_all};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Write `data` to a sibling temp file and rename it over `path`.
///
/// A reader never observes a partially written file; an interrupted run
/// leaves at most the `.tmp` sibling behind.
pub fn write_bytes_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let parent = path.parent().filter(|parent| !parent.as_os_str().is_empty());
    if let Some(parent) = parent {
        create_dir_all(parent)?;
    }

    let tmp_path = temp_path(path)?;
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&tmp_path)?;
    file.write_all(data)?;
    file.sync_all()?;

    if let Some(parent) = parent {
        sync_dir(parent)?;
    }
    std::fs::rename(&tmp_path, path)?;
    if let Some(parent) = parent {
        sync_dir(parent)?;
    }

    Ok(())
}

fn temp_path(path: &Path) -> io::Result<PathBuf> {
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} does not name a file", path.display()),
        )
    })?;
    let tmp_name = format!("{}.tmp", file_name.to_string_lossy());
    Ok(path.with_file_name(tmp_name))
}

#[cfg(unix)]
fn sync_dir(path: &Path) -> io::Result<()> {
    let dir = OpenOptions::new().read(true).open(path)?;
    dir.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_existing_file_and_leaves_no_temp() {
        let dir = std::env::temp_dir().join(format!("pactcheck-atomic-{}", std::process::id()));
        let path = dir.join("nested").join("report.json");

        write_bytes_atomic(&path, b"{\"first\":true}\n").expect("first write");
        write_bytes_atomic(&path, b"{\"second\":true}\n").expect("second write");

        let content = std::fs::read_to_string(&path).expect("read back");
        assert_eq!(content, "{\"second\":true}\n");
        assert!(!dir.join("nested").join("report.json.tmp").exists());

        std::fs::remove_dir_all(&dir).expect("cleanup");
    }
}
