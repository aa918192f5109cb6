//! Package version handling
//!
//! [`Version`] understands the PEP 440 layout used by Python packages
//! (`[N!]N(.N)*[{a|b|rc}N][.postN][.devN][+local]`), including the alternate
//! spellings accepted there, and orders versions the same way `pip` does.
//! On top of that:
//! - [`increment_version`] bumps individual segments
//! - [`file`] reads and rewrites the version attribute of a source file
//! - [`infer`] guesses which segment a commit message should bump

pub mod file;
pub mod infer;

use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

pub use file::{get_version_from_file, set_version_in_file};
pub use infer::infer_affected_version_segment_from_msg;

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("invalid version: '{0}'")]
    Parse(String),
    #[error("invalid segment name: '{0}'")]
    InvalidSegment(String),
    #[error("no '{attr}' assignment found in {path}")]
    AttributeNotFound { attr: String, path: String },
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Regex(#[from] regex::Error),
}

const VERSION_PATTERN: &str = r"(?ix)
        ^\s*v?
        (?:(?P<epoch>[0-9]+)!)?
        (?P<release>[0-9]+(?:\.[0-9]+)*)
        (?P<pre>
            [-_.]?
            (?P<pre_l>alpha|beta|preview|pre|rc|a|b|c)
            [-_.]?
            (?P<pre_n>[0-9]+)?
        )?
        (?P<post>
            (?:-(?P<post_n1>[0-9]+))
            |
            (?:[-_.]?(?P<post_l>post|rev|r)[-_.]?(?P<post_n2>[0-9]+)?)
        )?
        (?P<dev>
            [-_.]?
            (?P<dev_l>dev)
            [-_.]?
            (?P<dev_n>[0-9]+)?
        )?
        (?:\+(?P<local>[a-z0-9]+(?:[-_.][a-z0-9]+)*))?
        \s*$";

static VERSION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(VERSION_PATTERN).expect("Failed to compile version regex"));

/// Pre-release kind, ordered `a < b < rc`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreKind {
    Alpha,
    Beta,
    ReleaseCandidate,
}

impl PreKind {
    fn from_label(label: &str) -> Self {
        match label.to_lowercase().as_str() {
            "a" | "alpha" => Self::Alpha,
            "b" | "beta" => Self::Beta,
            _ => Self::ReleaseCandidate,
        }
    }
}

impl fmt::Display for PreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Alpha => "a",
            Self::Beta => "b",
            Self::ReleaseCandidate => "rc",
        })
    }
}

/// Bumpable part of a version, listed in inference priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    Major,
    Minor,
    Micro,
    Dev,
    Pre,
    Post,
}

impl Segment {
    pub const ALL: [Segment; 6] = [
        Segment::Major,
        Segment::Minor,
        Segment::Micro,
        Segment::Dev,
        Segment::Pre,
        Segment::Post,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Micro => "micro",
            Self::Dev => "dev",
            Self::Pre => "pre",
            Self::Post => "post",
        }
    }
}

impl FromStr for Segment {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|segment| segment.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| VersionError::InvalidSegment(s.to_string()))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum LocalPart<'a> {
    // Strings sort before numbers
    Text(&'a str),
    Number(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum PreKey {
    // A bare dev release sorts before every pre-release of the same release
    DevOnly,
    Pre(PreKind, u64),
    Final,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum DevKey {
    Dev(u64),
    Release,
}

type SortKey<'a> = (u64, &'a [u64], PreKey, Option<u64>, DevKey, Option<Vec<LocalPart<'a>>>);

#[derive(Debug, Clone)]
pub struct Version {
    pub epoch: u64,
    pub release: Vec<u64>,
    pub pre: Option<(PreKind, u64)>,
    pub post: Option<u64>,
    pub dev: Option<u64>,
    /// Normalized local label, without the leading `+`
    pub local: Option<String>,
}

impl Version {
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let captures = VERSION_REGEX
            .captures(input)
            .ok_or_else(|| VersionError::Parse(input.to_string()))?;

        let number = |name: &str| -> Result<Option<u64>, VersionError> {
            captures
                .name(name)
                .map(|m| {
                    m.as_str()
                        .parse::<u64>()
                        .map_err(|_| VersionError::Parse(input.to_string()))
                })
                .transpose()
        };

        let release = captures
            .name("release")
            .map(|m| m.as_str())
            .unwrap_or_default()
            .split('.')
            .map(|part| {
                part.parse::<u64>()
                    .map_err(|_| VersionError::Parse(input.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let pre = match captures.name("pre_l") {
            Some(label) => Some((PreKind::from_label(label.as_str()), number("pre_n")?.unwrap_or(0))),
            None => None,
        };

        let post = if captures.name("post").is_some() {
            Some(number("post_n1")?.or(number("post_n2")?).unwrap_or(0))
        } else {
            None
        };

        let dev = if captures.name("dev").is_some() {
            Some(number("dev_n")?.unwrap_or(0))
        } else {
            None
        };

        let local = captures
            .name("local")
            .map(|m| m.as_str().to_lowercase().replace(['-', '_'], "."));

        Ok(Self {
            epoch: number("epoch")?.unwrap_or(0),
            release,
            pre,
            post,
            dev,
            local,
        })
    }

    pub fn major(&self) -> u64 {
        self.release_part(0)
    }

    pub fn minor(&self) -> u64 {
        self.release_part(1)
    }

    pub fn micro(&self) -> u64 {
        self.release_part(2)
    }

    fn release_part(&self, index: usize) -> u64 {
        self.release.get(index).copied().unwrap_or(0)
    }

    fn set_release_part(&mut self, index: usize, value: u64) {
        if self.release.len() <= index {
            self.release.resize(index + 1, 0);
        }
        self.release[index] = value;
    }

    pub fn set_major(&mut self, value: u64) {
        self.set_release_part(0, value);
    }

    pub fn set_minor(&mut self, value: u64) {
        self.set_release_part(1, value);
    }

    pub fn set_micro(&mut self, value: u64) {
        self.set_release_part(2, value);
    }

    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    fn sort_key(&self) -> SortKey<'_> {
        // Trailing zeros do not count: 1.0 == 1.0.0
        let mut release = self.release.as_slice();
        while release.len() > 1 && release.last() == Some(&0) {
            release = &release[..release.len() - 1];
        }

        let pre = match (self.pre, self.post, self.dev) {
            (Some((kind, n)), _, _) => PreKey::Pre(kind, n),
            (None, None, Some(_)) => PreKey::DevOnly,
            _ => PreKey::Final,
        };
        let dev = self.dev.map_or(DevKey::Release, DevKey::Dev);
        let local = self.local.as_ref().map(|local| {
            local
                .split('.')
                .map(|part| match part.parse::<u64>() {
                    Ok(n) => LocalPart::Number(n),
                    Err(_) => LocalPart::Text(part),
                })
                .collect()
        });

        (self.epoch, release, pre, self.post, dev, local)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch != 0 {
            write!(f, "{}!", self.epoch)?;
        }
        let release: Vec<String> = self.release.iter().map(u64::to_string).collect();
        f.write_str(&release.join("."))?;
        if let Some((kind, n)) = self.pre {
            write!(f, "{kind}{n}")?;
        }
        if let Some(post) = self.post {
            write!(f, ".post{post}")?;
        }
        if let Some(dev) = self.dev {
            write!(f, ".dev{dev}")?;
        }
        if let Some(local) = &self.local {
            write!(f, "+{local}")?;
        }
        Ok(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// Add `amount` to each listed segment
///
/// Lower segments are left untouched (`1.2.3` bumped on `minor` gives `1.3.3`).
/// A missing pre-release starts as `rc0`, a missing dev or post segment as `0`.
pub fn increment_version(version: &Version, increments: &[(Segment, u64)]) -> Version {
    let mut bumped = version.clone();
    for &(segment, amount) in increments {
        match segment {
            Segment::Major => bumped.set_major(bumped.major() + amount),
            Segment::Minor => bumped.set_minor(bumped.minor() + amount),
            Segment::Micro => bumped.set_micro(bumped.micro() + amount),
            Segment::Pre => {
                let (kind, n) = bumped.pre.unwrap_or((PreKind::ReleaseCandidate, 0));
                bumped.pre = Some((kind, n + amount));
            }
            Segment::Post => bumped.post = Some(bumped.post.unwrap_or(0) + amount),
            Segment::Dev => bumped.dev = Some(bumped.dev.unwrap_or(0) + amount),
        }
    }
    bumped
}

/// Parse `name` or `name=amount` (amount defaults to 1)
pub fn parse_increment(spec: &str) -> Result<(Segment, u64), VersionError> {
    match spec.split_once('=') {
        Some((name, amount)) => {
            let amount = amount
                .trim()
                .parse()
                .map_err(|_| VersionError::InvalidSegment(spec.to_string()))?;
            Ok((name.parse()?, amount))
        }
        None => Ok((spec.parse()?, 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_version_regex_compiles_once() {
        let first: *const Regex = &*VERSION_REGEX;
        assert!(Version::parse("1.2.3").is_ok());
        assert!(Version::parse("2.0rc1").is_ok());
        assert!(std::ptr::eq(first, &*VERSION_REGEX));
    }

    #[test]
    fn test_borrowed_sort_key_orders_release_and_local() {
        assert_eq!(v("0"), v("0.0"));
        assert!(v("1.0.1") > v("1.0"));
        assert!(v("1.0+abc.2") < v("1.0+abc.10"));
        assert!(v("1.0+abc") < v("1.0+5"));
    }

    #[test]
    fn test_parse_full_version() {
        let version = v("1!2.3.4rc5.post6.dev7+ubuntu-1");
        assert_eq!(version.epoch, 1);
        assert_eq!(version.release, vec![2, 3, 4]);
        assert_eq!(version.pre, Some((PreKind::ReleaseCandidate, 5)));
        assert_eq!(version.post, Some(6));
        assert_eq!(version.dev, Some(7));
        assert_eq!(version.local.as_deref(), Some("ubuntu.1"));
        assert_eq!(version.to_string(), "1!2.3.4rc5.post6.dev7+ubuntu.1");
    }

    #[test]
    fn test_alternate_spellings_normalize() {
        assert_eq!(v("v1.0-alpha.1").to_string(), "1.0a1");
        assert_eq!(v("1.0.BETA2").to_string(), "1.0b2");
        assert_eq!(v("1.0c3").to_string(), "1.0rc3");
        assert_eq!(v("1.0preview").to_string(), "1.0rc0");
        assert_eq!(v("1.0-3").to_string(), "1.0.post3");
        assert_eq!(v("1.0.rev").to_string(), "1.0.post0");
        assert_eq!(v("1.0_dev").to_string(), "1.0.dev0");
        assert_eq!(v("  2.1  ").to_string(), "2.1");
    }

    #[test]
    fn test_invalid_versions() {
        for input in ["", "abc", "1..2", "1.0+", "1.0 beta gamma"] {
            assert!(
                matches!(Version::parse(input), Err(VersionError::Parse(_))),
                "{input} should not parse"
            );
        }
    }

    #[test]
    fn test_ordering() {
        let ordered = [
            "1.0.dev0",
            "1.0a1.dev1",
            "1.0a1",
            "1.0b1",
            "1.0rc1",
            "1.0",
            "1.0+local.1",
            "1.0+local.2",
            "1.0.post1.dev1",
            "1.0.post1",
            "1.1",
            "1!0.1",
        ];
        for pair in ordered.windows(2) {
            assert!(v(pair[0]) < v(pair[1]), "{} < {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_trailing_zeros_compare_equal() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert!(v("1.0+abc") < v("1.0+5"));
    }

    #[test]
    fn test_increment_release_segments() {
        let bumped = increment_version(&v("1.2.3"), &[(Segment::Minor, 1)]);
        assert_eq!(bumped.to_string(), "1.3.3");

        let bumped = increment_version(&v("1.2.3"), &[(Segment::Major, 2), (Segment::Micro, 1)]);
        assert_eq!(bumped.to_string(), "3.2.4");

        let bumped = increment_version(&v("4"), &[(Segment::Micro, 1)]);
        assert_eq!(bumped.to_string(), "4.0.1");
    }

    #[test]
    fn test_increment_optional_segments() {
        assert_eq!(
            increment_version(&v("1.0"), &[(Segment::Pre, 1)]).to_string(),
            "1.0rc1"
        );
        assert_eq!(
            increment_version(&v("1.0b2"), &[(Segment::Pre, 1)]).to_string(),
            "1.0b3"
        );
        assert_eq!(
            increment_version(&v("1.0"), &[(Segment::Dev, 2)]).to_string(),
            "1.0.dev2"
        );
        assert_eq!(
            increment_version(&v("1.0.post4"), &[(Segment::Post, 1)]).to_string(),
            "1.0.post5"
        );
    }

    #[test]
    fn test_segment_parsing() {
        assert_eq!("MAJOR".parse::<Segment>().unwrap(), Segment::Major);
        assert!(matches!(
            "patch".parse::<Segment>(),
            Err(VersionError::InvalidSegment(_))
        ));
        assert_eq!(parse_increment("minor").unwrap(), (Segment::Minor, 1));
        assert_eq!(parse_increment("dev=3").unwrap(), (Segment::Dev, 3));
        assert!(parse_increment("dev=x").is_err());
    }
}
