use crate::archive::Role;
use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// The seven check categories, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CheckKind {
    Name,
    Duplicate,
    Protection,
    RawDerivative,
    Path,
    Checksum,
    Missing,
}

impl CheckKind {
    pub const ALL: [CheckKind; 7] = [
        Self::Name,
        Self::Duplicate,
        Self::Protection,
        Self::RawDerivative,
        Self::Path,
        Self::Checksum,
        Self::Missing,
    ];

    /// Token used on the command line.
    pub fn token(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Duplicate => "dup",
            Self::Protection => "prot",
            Self::RawDerivative => "raw",
            Self::Path => "path",
            Self::Checksum => "cs",
            Self::Missing => "miss",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for CheckKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.token() == s)
            .ok_or_else(|| Error::Config(format!("unknown check '{s}'")))
    }
}

/// Parses a comma-separated token list such as `cs,dup`.
pub fn parse_check_list(list: &str) -> Result<BTreeSet<CheckKind>> {
    list.split(',')
        .map(|token| token.trim().parse())
        .collect()
}

/// Which categories to run. Only-lists and ignore-lists are mutually
/// exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    All,
    Only(BTreeSet<CheckKind>),
    Ignore(BTreeSet<CheckKind>),
}

impl Selection {
    pub fn from_lists(only: Option<&str>, ignore: Option<&str>) -> Result<Self> {
        match (only, ignore) {
            (Some(_), Some(_)) => Err(Error::Config(
                "only-list and ignore-list are mutually exclusive".into(),
            )),
            (Some(only), None) => Ok(Self::Only(parse_check_list(only)?)),
            (None, Some(ignore)) => Ok(Self::Ignore(parse_check_list(ignore)?)),
            (None, None) => Ok(Self::All),
        }
    }
}

fn auto_ignored(role: Role) -> &'static [CheckKind] {
    use CheckKind::*;
    match role {
        Role::New => &[Checksum, Missing, Protection],
        Role::Original => &[],
        Role::Lab => &[Checksum, Missing, Protection, Path, RawDerivative],
        Role::Album | Role::Print => &[Checksum, Missing, Protection],
    }
}

fn mandatory(role: Role) -> &'static [CheckKind] {
    match role {
        Role::New => &[CheckKind::Duplicate, CheckKind::Path],
        _ => &[],
    }
}

/// Resolves a selection against the role's rules.
pub fn checklist(role: Role, selection: &Selection) -> Result<BTreeSet<CheckKind>> {
    let (mut checks, ignored) = match selection {
        Selection::All => (CheckKind::ALL.into_iter().collect(), BTreeSet::new()),
        Selection::Only(only) => (only.clone(), BTreeSet::new()),
        Selection::Ignore(ignore) => (CheckKind::ALL.into_iter().collect(), ignore.clone()),
    };

    if let Some(kind) = mandatory(role).iter().find(|k| ignored.contains(*k)) {
        return Err(Error::Config(format!(
            "Ignoring '{kind}' violations is not allowed in {role}!"
        )));
    }

    if let Selection::Only(only) = selection {
        for kind in mandatory(role).iter().filter(|k| !only.contains(*k)) {
            warn!("Skipping '{kind}' checks in {role} is strongly discouraged!");
        }
    }

    checks.retain(|kind| !ignored.contains(kind) && !auto_ignored(role).contains(kind));

    if checks.is_empty() {
        return Err(Error::Config("Everything ignored, nothing to check!".into()));
    }
    if !checks.contains(&CheckKind::Name) {
        warn!("Ignoring name violations is strongly discouraged!");
    }
    Ok(checks)
}
