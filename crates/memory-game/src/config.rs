//! JSON configuration and OpenCV calibration loading.

use crate::frame::{FrameConfig, FrameProcessor};
use memory_game_core::{CameraIntrinsics, CameraModel, Distortion};
use memory_game_markers::MarkerCatalog;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid calibration: {0}")]
    Calibration(String),
}

/// Everything needed to run the frame pipeline.
///
/// Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryGameConfig {
    /// Camera used when `calibration_path` is not set.
    #[serde(default)]
    pub camera: CameraModel,
    /// OpenCV `FileStorage` JSON with `Intrinsics` and `DistCoeffs`.
    #[serde(default)]
    pub calibration_path: Option<PathBuf>,
    #[serde(flatten)]
    pub frame: FrameConfig,
}

impl MemoryGameConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// The calibrated camera if a calibration file is configured, otherwise
    /// the inline `camera`.
    pub fn camera_model(&self) -> Result<CameraModel, ConfigError> {
        match &self.calibration_path {
            Some(path) => load_opencv_calibration(path),
            None => Ok(self.camera),
        }
    }

    /// Build a frame processor over `catalog` from this config.
    pub fn build_processor(&self, catalog: MarkerCatalog) -> Result<FrameProcessor, ConfigError> {
        let camera = self.camera_model()?;
        if !camera.intrinsics.is_valid() {
            return Err(ConfigError::Calibration(
                "camera intrinsics must be finite with non-zero focal lengths".into(),
            ));
        }
        Ok(FrameProcessor::new(catalog, camera, self.frame.clone()))
    }
}

/// An `opencv-matrix` node of an OpenCV `FileStorage` JSON document.
#[derive(Debug, Clone, Deserialize)]
struct OpenCvMatrix {
    type_id: String,
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl OpenCvMatrix {
    fn check(&self, name: &str) -> Result<(), ConfigError> {
        if self.type_id != "opencv-matrix" {
            return Err(ConfigError::Calibration(format!(
                "{name}: expected type_id \"opencv-matrix\", got {:?}",
                self.type_id
            )));
        }
        if self.data.len() != self.rows * self.cols {
            return Err(ConfigError::Calibration(format!(
                "{name}: {}x{} matrix with {} values",
                self.rows,
                self.cols,
                self.data.len()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct OpenCvCalibration {
    #[serde(rename = "Intrinsics")]
    intrinsics: OpenCvMatrix,
    #[serde(rename = "DistCoeffs")]
    dist_coeffs: OpenCvMatrix,
}

/// Read a camera calibration written by OpenCV's `FileStorage` in JSON mode.
///
/// `Intrinsics` must be `3 × 3`; `DistCoeffs` may hold up to five values
/// (`k1 k2 p1 p2 k3`), missing ones default to zero.
pub fn load_opencv_calibration(path: impl AsRef<Path>) -> Result<CameraModel, ConfigError> {
    let raw = fs::read_to_string(path)?;
    let calib: OpenCvCalibration = serde_json::from_str(&raw)?;

    calib.intrinsics.check("Intrinsics")?;
    calib.dist_coeffs.check("DistCoeffs")?;
    if calib.intrinsics.rows != 3 || calib.intrinsics.cols != 3 {
        return Err(ConfigError::Calibration(format!(
            "Intrinsics: expected 3x3, got {}x{}",
            calib.intrinsics.rows, calib.intrinsics.cols
        )));
    }

    let k = Matrix3::from_row_slice(&calib.intrinsics.data);
    let intrinsics = CameraIntrinsics::from_matrix(&k);
    if !intrinsics.is_valid() {
        return Err(ConfigError::Calibration(
            "Intrinsics: focal lengths must be finite and non-zero".into(),
        ));
    }
    let distortion = Distortion::from_coefficients(&calib.dist_coeffs.data).ok_or_else(|| {
        ConfigError::Calibration(format!(
            "DistCoeffs: expected at most 5 values, got {}",
            calib.dist_coeffs.data.len()
        ))
    })?;

    Ok(CameraModel {
        intrinsics,
        distortion,
    })
}
