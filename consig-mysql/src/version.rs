use std::num::NonZeroI32;

/// Parses a MySQL version string such as `5.7.44-log` into `MAJOR * 10000 + MINOR * 100 + PATCH`.
///
/// Returns `None` when the string cannot be parsed or evaluates to zero.
pub fn extract_server_version(server_version_str: impl AsRef<str>) -> Option<NonZeroI32> {
    let version_part = server_version_str
        .as_ref()
        .split_whitespace()
        .next()?
        .split('-')
        .next()?;

    let mut components = version_part
        .split('.')
        .map(|component| component.parse::<i32>().unwrap_or(0));

    let major = components.next().unwrap_or(0);
    let minor = components.next().unwrap_or(0);
    let patch = components.next().unwrap_or(0);

    NonZeroI32::new(major * 10000 + minor * 100 + patch)
}
