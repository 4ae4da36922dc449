use std::str::FromStr;

use derive_more::Display;

use crate::Error;

/// Installed agent version (major.minor.patch)
///
/// Pre-release and build suffixes (`2.1.0-rc1`) are ignored for
/// compatibility decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display("{}.{}.{}", major, minor, patch)]
pub struct AgentVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl AgentVersion {
    /// First version that accepts capability tokens
    pub const TOKEN_COMPATIBLE: Self = Self::new(1, 4, 0);
    /// First version with the container subsystem
    pub const V2_COMPATIBLE: Self = Self::new(2, 0, 0);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// What this agent version is able to do
    pub fn capabilities(&self) -> AgentCapabilities {
        AgentCapabilities {
            token_compatible: *self >= Self::TOKEN_COMPATIBLE,
            v2_compatible: *self >= Self::V2_COMPATIBLE,
        }
    }
}

impl FromStr for AgentVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let core = s
            .trim()
            .trim_start_matches('v')
            .split(['-', '+'])
            .next()
            .unwrap_or_default();

        let mut parts = core.split('.').map(|part| {
            part.parse::<u32>()
                .map_err(|_| Error::InvalidData(format!("invalid agent version '{s}'")))
        });
        let major = parts
            .next()
            .ok_or_else(|| Error::InvalidData(format!("invalid agent version '{s}'")))??;
        let minor = parts.next().transpose()?.unwrap_or(0);
        let patch = parts.next().transpose()?.unwrap_or(0);

        Ok(Self::new(major, minor, patch))
    }
}

/// Feature flags derived from the agent version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AgentCapabilities {
    /// Agent accepts capability tokens on its admin API
    pub token_compatible: bool,
    /// Agent manages plugin containers
    pub v2_compatible: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_suffix() {
        let version: AgentVersion = "2.1.3-beta.4".parse().unwrap();
        assert_eq!(version, AgentVersion::new(2, 1, 3));
        assert_eq!(version.to_string(), "2.1.3");
    }

    #[test]
    fn test_parse_short_forms() {
        assert_eq!("1.4".parse::<AgentVersion>().unwrap(), AgentVersion::new(1, 4, 0));
        assert_eq!("v3".parse::<AgentVersion>().unwrap(), AgentVersion::new(3, 0, 0));
        assert!("".parse::<AgentVersion>().is_err());
        assert!("two.zero".parse::<AgentVersion>().is_err());
    }

    #[test]
    fn test_capabilities() {
        let legacy = AgentVersion::new(1, 3, 9).capabilities();
        assert!(!legacy.token_compatible);
        assert!(!legacy.v2_compatible);

        let token_only = AgentVersion::new(1, 4, 0).capabilities();
        assert!(token_only.token_compatible);
        assert!(!token_only.v2_compatible);

        let current = AgentVersion::new(2, 0, 0).capabilities();
        assert!(current.token_compatible);
        assert!(current.v2_compatible);
    }
}
