use super::{Version, VersionError};
use regex::{NoExpand, Regex};
use std::fs;
use std::path::Path;

pub const DEFAULT_VERSION_FILE: &str = "./__init__.py";
pub const DEFAULT_VERSION_ATTR: &str = "__version__";

fn read(path: &Path) -> Result<String, VersionError> {
    fs::read_to_string(path).map_err(|source| VersionError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn assignment_pattern(attr: &str) -> Result<Regex, VersionError> {
    Ok(Regex::new(&format!(
        r#"{}\s*=\s*['"](?P<version>.+)['"]"#,
        regex::escape(attr)
    ))?)
}

/// Read the version assigned to `attr` in `path`
///
/// With an empty `attr` the whole first line of the file is the version.
pub fn get_version_from_file(path: impl AsRef<Path>, attr: &str) -> Result<Version, VersionError> {
    let path = path.as_ref();
    let content = read(path)?;

    let raw = if attr.is_empty() {
        content.lines().next().unwrap_or_default().to_string()
    } else {
        assignment_pattern(attr)?
            .captures(&content)
            .and_then(|captures| captures.name("version"))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| VersionError::AttributeNotFound {
                attr: attr.to_string(),
                path: path.display().to_string(),
            })?
    };

    Version::parse(&raw)
}

/// Rewrite every `attr = '...'` assignment in `path` with `version`
///
/// With an empty `attr` the file is replaced by the version alone.
/// Returns the version string that was written.
pub fn set_version_in_file(
    version: &Version,
    path: impl AsRef<Path>,
    attr: &str,
) -> Result<String, VersionError> {
    let path = path.as_ref();
    let version = version.to_string();

    let content = if attr.is_empty() {
        version.clone()
    } else {
        let content = read(path)?;
        let replacement = format!("{attr} = '{version}'");
        assignment_pattern(attr)?
            .replace_all(&content, NoExpand(&replacement))
            .into_owned()
    };

    fs::write(path, content).map_err(|source| VersionError::Io {
        path: path.display().to_string(),
        source,
    })?;
    tracing::info!("Set version {} in {}", version, path.display());
    Ok(version)
}
