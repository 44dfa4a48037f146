//! Job files: the calibration chain plus every frame to triangulate.
//!
//! ```json
//! {
//!   "camchain":    [[[1,0,0,0],[0,1,0,0],[0,0,1,0],[0,0,0,1]], ...],
//!   "corrections": [[[1,0,0,0],[0,1,0,0],[0,0,1,0],[0,0,0,1]], ...],
//!   "frames": [
//!     { "frame": 0,
//!       "intrinsics":   { "0": [600.0, 0.12, 320.0, 240.0] },
//!       "observations": { "nose": { "0": [101.5, 88.0], "2": [97.0, 90.5] } } }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use skewray_geometry::CalibrationChain;
use skewray_runtime::FrameInput;
use tracing::warn;

use crate::error::CliError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(flatten)]
    pub chain: CalibrationChain,
    #[serde(default)]
    pub frames: Vec<FrameInput>,
}

impl Job {
    /// Warn when the chain cannot serve every camera of the rig.  Missing
    /// cameras still surface as skips in every frame.
    pub fn check_capacity(&self, cameras: usize) {
        let capacity = self.chain.camera_capacity();
        if capacity < cameras {
            warn!(
                capacity,
                cameras,
                links = self.chain.links.len(),
                corrections = self.chain.corrections.len(),
                "calibration chain is shorter than the rig"
            );
        }
    }
}

pub fn load(path: &Path) -> Result<Job, CliError> {
    let raw = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| CliError::Job {
        path: path.to_path_buf(),
        source,
    })
}
