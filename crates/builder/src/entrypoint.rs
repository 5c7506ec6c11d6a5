//! Entrypoint script generation

use cibox_errors::Error;
use cibox_platform::fs;
use cibox_types::Job;
use std::path::PathBuf;

use crate::staging::BuildContext;

/// Quote `value` as a single shell word
#[must_use]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Script run by the container: echoes each command before running it
#[must_use]
pub fn render_entrypoint(job: &Job) -> String {
    let mut script = String::from("#!/bin/bash\nset -e\n");
    for cmd in &job.phases().run {
        script.push_str("echo ");
        script.push_str(&shell_quote(&format!("> {cmd}")));
        script.push('\n');
        script.push_str(cmd);
        script.push('\n');
    }
    script
}

/// Write the entrypoint into the build context with mode `0755`
///
/// # Errors
///
/// Returns a `StagingError` if the file cannot be written or made executable.
pub async fn write_entrypoint(context: &BuildContext, job: &Job) -> Result<PathBuf, Error> {
    let path = context.entrypoint_path();
    fs::write_file(&path, &render_entrypoint(job)).await?;
    fs::set_executable(&path).await?;
    Ok(path)
}
