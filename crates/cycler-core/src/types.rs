//! Shared types used across Cloud Cycler crates.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Provider resource type names that the stack controller treats specially.
pub mod resource_types {
    pub const STACK: &str = "AWS::CloudFormation::Stack";
    pub const SCALING_GROUP: &str = "AWS::AutoScaling::AutoScalingGroup";
    pub const DATABASE: &str = "AWS::RDS::DBInstance";
    pub const INSTANCE: &str = "AWS::EC2::Instance";
}

/// Size limits of a scaling group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingBounds {
    pub min_size: u32,
    pub max_size: u32,
    pub desired_capacity: u32,
}

impl ScalingBounds {
    pub const ZERO: ScalingBounds = ScalingBounds {
        min_size: 0,
        max_size: 0,
        desired_capacity: 0,
    };

    pub fn new(min_size: u32, max_size: u32, desired_capacity: u32) -> Self {
        Self {
            min_size,
            max_size,
            desired_capacity,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for ScalingBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "min={} max={} desired={}",
            self.min_size, self.max_size, self.desired_capacity
        )
    }
}

/// The kinds of resource a task can cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Instance,
    ScalingGroup,
    Stack,
}

impl ResourceKind {
    /// All kinds, in the order a task processes them.
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Instance,
        ResourceKind::ScalingGroup,
        ResourceKind::Stack,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Instance => "instance",
            ResourceKind::ScalingGroup => "scaling_group",
            ResourceKind::Stack => "stack",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown resource kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for ResourceKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instance" | "ec2" => Ok(ResourceKind::Instance),
            "scaling_group" | "asg" => Ok(ResourceKind::ScalingGroup),
            "stack" | "cfn" => Ok(ResourceKind::Stack),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// A (kind, id) pair naming one resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub id: String,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// An include or exclude rule: a literal id, or a regex pattern.
///
/// Patterns are written between slashes (`/stage0\d\d/`) and match
/// anywhere in the id unless anchored.
#[derive(Debug, Clone)]
pub enum Matcher {
    Literal(String),
    Pattern(Regex),
}

#[derive(Debug, Error)]
#[error("invalid pattern {pattern:?}: {source}")]
pub struct MatcherError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

impl Matcher {
    pub fn literal(id: impl Into<String>) -> Self {
        Matcher::Literal(id.into())
    }

    pub fn pattern(pattern: &str) -> Result<Self, MatcherError> {
        Regex::new(pattern)
            .map(Matcher::Pattern)
            .map_err(|source| MatcherError {
                pattern: pattern.to_string(),
                source,
            })
    }

    /// Parse the configuration form: `/regex/` or a literal id.
    pub fn parse(text: &str) -> Result<Self, MatcherError> {
        match text
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
        {
            Some(pattern) if text.len() >= 2 => Self::pattern(pattern),
            _ => Ok(Self::literal(text)),
        }
    }

    pub fn matches(&self, id: &str) -> bool {
        match self {
            Matcher::Literal(literal) => literal == id,
            Matcher::Pattern(re) => re.is_match(id),
        }
    }
}

impl PartialEq for Matcher {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Matcher::Literal(a), Matcher::Literal(b)) => a == b,
            (Matcher::Pattern(a), Matcher::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Literal(literal) => f.write_str(literal),
            Matcher::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

impl FromStr for Matcher {
    type Err = MatcherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
