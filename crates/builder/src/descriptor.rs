//! Build descriptor generation

use cibox_config::fixed_paths;
use cibox_errors::Error;
use cibox_platform::fs;
use cibox_types::{EnvVar, Job};

use crate::staging::BuildContext;

/// Descriptor instructions for `job`, one per line
///
/// The number of lines is the number of build steps the engine will report.
#[must_use]
pub fn render_descriptor(job: &Job, entrypoint_filename: &str, base_image: &str) -> Vec<String> {
    let mut lines = vec![format!("FROM {base_image}:{}", job.runtime_version())];

    lines.extend(job.env().iter().map(env_instruction));

    lines.push(format!(
        "COPY {} {}",
        fixed_paths::STAGED_SOURCE_DIR,
        fixed_paths::CONTAINER_PROJECT_ROOT
    ));
    lines.push(format!("WORKDIR {}", fixed_paths::CONTAINER_PROJECT_ROOT));

    lines.extend(job.phases().image_commands().map(|cmd| format!("RUN {cmd}")));

    lines.push(format!(
        "COPY {entrypoint_filename} {}",
        fixed_paths::ENTRYPOINT_PATH
    ));
    lines.push(format!("CMD [\"{}\"]", fixed_paths::ENTRYPOINT_PATH));
    lines
}

/// `ENV` instruction for one variable
///
/// Plain values use the `ENV NAME value` form. Values the builder would
/// otherwise alter (empty, padded, quoted or containing `$` or `\`) are
/// written as `ENV NAME="..."` with escapes.
fn env_instruction(var: &EnvVar) -> String {
    let plain = !var.value.is_empty()
        && var.value.trim() == var.value
        && !var.value.contains(['"', '\'', '\\', '$']);
    if plain {
        return format!("ENV {} {}", var.name, var.value);
    }

    let mut quoted = String::with_capacity(var.value.len() + 2);
    for c in var.value.chars() {
        if matches!(c, '"' | '\\' | '$') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    format!("ENV {}=\"{quoted}\"", var.name)
}

/// Write the descriptor into the build context and return its lines
///
/// # Errors
///
/// Returns a `StagingError` if the file cannot be written.
pub async fn write_descriptor(
    context: &BuildContext,
    job: &Job,
    base_image: &str,
) -> Result<Vec<String>, Error> {
    let lines = render_descriptor(job, context.entrypoint_filename(), base_image);
    let mut contents = lines.join("\n");
    contents.push('\n');
    fs::write_file(&context.descriptor_path(), &contents).await?;
    Ok(lines)
}
