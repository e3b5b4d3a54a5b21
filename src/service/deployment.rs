use std::fmt;
use std::str::FromStr;

use serde::de;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

use crate::ConfigError;

/// Runtime environment class a service instance belongs to.
///
/// Certain behaviors are gated on the deployment: mock services, for
/// example, refuse to start outside [`Deployment::Local`] and
/// [`Deployment::Testing`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Deployment {
    /// Production fleet
    Prod,
    /// Production-like staging environment
    Lab,
    /// Automated test runs
    Testing,
    /// Developer workstation
    #[default]
    Local,
}

impl Deployment {
    /// Whether mock services are allowed to run in this deployment.
    pub fn allows_mocks(&self) -> bool {
        matches!(self, Deployment::Local | Deployment::Testing)
    }
}

impl fmt::Display for Deployment {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let tag = match self {
            Deployment::Prod => "PROD",
            Deployment::Lab => "LAB",
            Deployment::Testing => "TESTING",
            Deployment::Local => "LOCAL",
        };
        write!(f, "{}", tag)
    }
}

impl FromStr for Deployment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PROD" => Ok(Deployment::Prod),
            "LAB" => Ok(Deployment::Lab),
            "TESTING" => Ok(Deployment::Testing),
            "LOCAL" => Ok(Deployment::Local),
            other => Err(ConfigError::InvalidDeployment(other.to_string())),
        }
    }
}

// Settings files and environment variables carry the tag as a free-form
// string, so deserialization goes through the case-insensitive parser.
impl<'de> Deserialize<'de> for Deployment {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        tag.parse().map_err(de::Error::custom)
    }
}

impl Serialize for Deployment {
    fn serialize<S>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
