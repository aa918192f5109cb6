use super::{Segment, VersionError};
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Built-in patterns compiled in [`Segment::ALL`] order
static DEFAULT_SEGMENT_REGEXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    Segment::ALL
        .into_iter()
        .map(|segment| {
            segment_regex(default_segment_pattern(segment))
                .expect("Failed to compile segment regex")
        })
        .collect()
});

fn segment_regex(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// Case-insensitive keywords that select each segment
pub fn default_segment_pattern(segment: Segment) -> &'static str {
    match segment {
        Segment::Major => r"major|breaking|break|bump major|bump major version|bump major version number",
        Segment::Minor => r"minor|feature|feat|bump minor|bump minor version|bump minor version number",
        Segment::Micro => concat!(
            r"micro|patch|fix|test|docs|style|refactor|perf|bump micro|bump micro version|",
            r"bump micro version number|doc|documentation|style|styling|refactoring|performance|",
            r"performance improvement|testing|tests|tests improvement|tests improvements"
        ),
        Segment::Pre => r"pre|prerelease|bump pre|bump pre version|bump pre version number",
        Segment::Post => r"post|bump post|bump post version|bump post version number",
        Segment::Dev => r"dev|bump dev|bump dev version|bump dev version number",
    }
}

/// Pick the segment a commit message bumps
///
/// Segments are tried in [`Segment::ALL`] order and the first whose pattern matches
/// anywhere in `msg` wins; `overrides` replaces the built-in pattern of a segment.
/// Nothing matching means [`Segment::Pre`].
pub fn infer_affected_version_segment_from_msg(
    msg: &str,
    overrides: &HashMap<Segment, String>,
) -> Result<Segment, VersionError> {
    for (segment, default) in Segment::ALL.into_iter().zip(DEFAULT_SEGMENT_REGEXES.iter()) {
        let matched = match overrides.get(&segment) {
            Some(pattern) => segment_regex(pattern)?.is_match(msg),
            None => default.is_match(msg),
        };
        if matched {
            tracing::debug!("Commit message matches the {} segment", segment);
            return Ok(segment);
        }
    }
    Ok(Segment::Pre)
}
