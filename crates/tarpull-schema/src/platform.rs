use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operating system and CPU architecture of an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub architecture: String,
    pub os: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl Platform {
    pub fn new(os: &str, architecture: &str) -> Self {
        Self {
            architecture: architecture.to_owned(),
            os: os.to_owned(),
            variant: None,
        }
    }

    /// Whether a manifest-list entry for `candidate` satisfies this target.
    ///
    /// Architecture and OS compare exactly. The variant is only checked when
    /// the target names one.
    pub fn matches(&self, candidate: &Self) -> bool {
        if self.architecture != candidate.architecture || self.os != candidate.os {
            return false;
        }
        match &self.variant {
            Some(v) => candidate.variant.as_deref() == Some(v.as_str()),
            None => true,
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::new("linux", "amd64")
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if let Some(v) = &self.variant {
            write!(f, "/{v}")?;
        }
        Ok(())
    }
}

impl FromStr for Platform {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(SchemaError::InvalidPlatform(s.to_owned()));
        }
        match parts.as_slice() {
            [os, arch] => Ok(Self::new(os, arch)),
            [os, arch, variant] => Ok(Self {
                variant: Some((*variant).to_owned()),
                ..Self::new(os, arch)
            }),
            _ => Err(SchemaError::InvalidPlatform(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_linux_amd64() {
        assert_eq!(Platform::default().to_string(), "linux/amd64");
    }

    #[test]
    fn parse_with_variant() {
        let p: Platform = "linux/arm64/v8".parse().unwrap();
        assert_eq!(p.os, "linux");
        assert_eq!(p.architecture, "arm64");
        assert_eq!(p.variant.as_deref(), Some("v8"));
        assert_eq!(p.to_string(), "linux/arm64/v8");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("amd64".parse::<Platform>().is_err());
        assert!("linux//amd64".parse::<Platform>().is_err());
        assert!("a/b/c/d".parse::<Platform>().is_err());
    }

    #[test]
    fn matching_is_exact() {
        let target = Platform::default();
        assert!(target.matches(&Platform::new("linux", "amd64")));
        assert!(!target.matches(&Platform::new("linux", "arm64")));
        assert!(!target.matches(&Platform::new("windows", "amd64")));
        // a substring hit must not count
        assert!(!target.matches(&Platform::new("linux", "amd64p32")));
    }

    #[test]
    fn variant_only_checked_when_requested() {
        let any_arm: Platform = "linux/arm".parse().unwrap();
        let v7: Platform = "linux/arm/v7".parse().unwrap();
        let v6: Platform = "linux/arm/v6".parse().unwrap();
        assert!(any_arm.matches(&v6));
        assert!(v7.matches(&v7));
        assert!(!v7.matches(&v6));
        assert!(!v7.matches(&any_arm));
    }
}
