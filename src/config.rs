use crate::error::WhrError;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_w2() -> f64 {
    300.0
}

/// Engine configuration. The recognized options are a closed set; unknown
/// keys in a config file are rejected as input errors.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WhrConfig {
    /// Rating variance gained per day of inactivity, in Elo^2 units.
    #[serde(default = "default_w2")]
    pub w2: f64,
    /// Fold player names to lowercase on every lookup.
    #[serde(default)]
    pub uncased: bool,
}

impl Default for WhrConfig {
    fn default() -> Self {
        Self {
            w2: default_w2(),
            uncased: false,
        }
    }
}

impl WhrConfig {
    /// Reads a configuration file. Parsed as json5 so hand-written configs
    /// may carry comments and trailing commas.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, WhrError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| WhrError::Input(format!("cannot read config {:?}: {}", path, e)))?;
        json5::from_str(&text).map_err(|e| WhrError::Input(format!("bad config: {}", e)))
    }

    /// The Wiener-process variance per day on the natural rating scale:
    /// `w2 * (ln 10 / 400)^2`.
    pub(crate) fn w2_natural(&self) -> f64 {
        let scale = std::f64::consts::LN_10 / 400.0;
        self.w2 * scale * scale
    }
}
