//! Filesystem helpers used while staging a build context
//!
//! All failures are reported as [`StagingError`]s carrying the offending path.

use cibox_errors::{Error, StagingError};
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;

/// Result type for filesystem operations
pub type Result<T> = std::result::Result<T, Error>;

/// Create a directory with all parent directories
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub async fn create_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path).await.map_err(|e| {
        StagingError::CreateDir {
            path: path.display().to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

/// Remove a directory tree; a missing directory is not an error
///
/// # Errors
///
/// Returns an error if the directory exists and cannot be removed.
pub async fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StagingError::RemoveDir {
            path: path.display().to_string(),
            message: e.to_string(),
        }
        .into()),
    }
}

/// Recursively copy a directory
///
/// # Errors
///
/// Returns an error if:
/// - Creating the destination directory fails
/// - Reading the source directory fails
/// - Copying any file or subdirectory fails
pub async fn copy_directory(src: &Path, dst: &Path) -> Result<()> {
    create_dir_all(dst).await?;

    let mut entries = fs::read_dir(src)
        .await
        .map_err(|e| StagingError::copy(&e, src, dst))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StagingError::copy(&e, src, dst))?
    {
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        let file_type = entry
            .file_type()
            .await
            .map_err(|e| StagingError::copy(&e, &src_path, &dst_path))?;
        if file_type.is_dir() {
            Box::pin(copy_directory(&src_path, &dst_path)).await?;
        } else {
            copy_entry(&src_path, &dst_path).await?;
        }
    }

    Ok(())
}

/// Copy a single file, creating parent directories as needed
///
/// Symbolic links are recreated as links on unix.
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created or the copy fails.
pub async fn copy_entry(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        create_dir_all(parent).await?;
    }

    let metadata = fs::symlink_metadata(src)
        .await
        .map_err(|e| StagingError::copy(&e, src, dst))?;

    if metadata.file_type().is_symlink() {
        return copy_symlink(src, dst).await;
    }

    fs::copy(src, dst)
        .await
        .map_err(|e| StagingError::copy(&e, src, dst))?;
    Ok(())
}

#[cfg(unix)]
async fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let target = fs::read_link(src)
        .await
        .map_err(|e| StagingError::copy(&e, src, dst))?;

    if fs::symlink_metadata(dst).await.is_ok() {
        fs::remove_file(dst)
            .await
            .map_err(|e| StagingError::copy(&e, src, dst))?;
    }

    fs::symlink(&target, dst)
        .await
        .map_err(|e| StagingError::copy(&e, src, dst))?;
    Ok(())
}

#[cfg(not(unix))]
async fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst)
        .await
        .map_err(|e| StagingError::copy(&e, src, dst))?;
    Ok(())
}

/// Write a text file, replacing any previous content
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub async fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents)
        .await
        .map_err(|e| StagingError::write(&e, path).into())
}

/// Mark a file executable (`0755`)
///
/// # Errors
///
/// Returns an error if the permissions cannot be changed.
#[cfg(unix)]
pub async fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .map_err(|e| {
            StagingError::Permissions {
                path: path.display().to_string(),
                message: e.to_string(),
            }
            .into()
        })
}

/// Mark a file executable (no-op on non-unix platforms)
///
/// # Errors
///
/// Never fails on this platform.
#[cfg(not(unix))]
pub async fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}
