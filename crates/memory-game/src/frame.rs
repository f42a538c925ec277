//! Per-frame pipeline: candidate quads in, identified markers and presence
//! transitions out.

use crate::overlay::Overlay;
use crate::presence::{DetectionSet, PresenceTracker, PresenceUpdate};
use log::{debug, warn};
use memory_game_core::{rectify_quad, CameraModel, GrayImageView, Quad, QuadFilterParams};
use memory_game_markers::{
    sample_marker_grid, DetectedMarker, GridSampleConfig, MarkerCatalog, MarkerMatcher,
};
use memory_game_pose::{PlanarPoseSolver, PoseResolver, PoseSolverParams, ResolvedPose};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

fn default_overlay_scale() -> f64 {
    1.0
}

/// Pipeline tuning shared by every frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameConfig {
    #[serde(default)]
    pub sampling: GridSampleConfig,
    #[serde(default)]
    pub quad_filter: QuadFilterParams,
    #[serde(default)]
    pub pose: PoseSolverParams,
    /// Edge length of the overlay cube in marker units.
    #[serde(default = "default_overlay_scale")]
    pub overlay_scale: f64,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            sampling: GridSampleConfig::default(),
            quad_filter: QuadFilterParams::default(),
            pose: PoseSolverParams::default(),
            overlay_scale: default_overlay_scale(),
        }
    }
}

/// What happened to one candidate quad.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CandidateOutcome {
    /// Outside the size window or wrongly wound.
    Rejected,
    /// No homography to the canonical square.
    RectifyFailed,
    /// Upstream contract violation (patch or grid geometry).
    Malformed { reason: String },
    NoMatch,
    Matched {
        id: u32,
        rotation_index: u8,
        pose_resolved: bool,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CandidateReport {
    /// Index into the quads passed to [`FrameProcessor::process_frame`].
    pub index: usize,
    pub quad: Quad,
    pub outcome: CandidateOutcome,
}

/// An identified marker and, when the pose solved, its overlay geometry.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MarkerObservation {
    pub marker: DetectedMarker,
    pub quad: Quad,
    pub pose: Option<ResolvedPose>,
    pub overlay: Option<Overlay>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameReport {
    /// Zero-based count of frames processed before this one.
    pub frame_index: u64,
    pub candidates: Vec<CandidateReport>,
    /// One entry per matched candidate, in input order.
    pub observations: Vec<MarkerObservation>,
    /// Markers of this frame keyed by id; the first candidate of an id wins.
    pub detections: DetectionSet,
    pub presence: PresenceUpdate,
}

/// Runs identification, pose and presence tracking over successive frames.
///
/// Frames are independent except for the presence set, which persists until
/// [`reset`](Self::reset).
#[derive(Debug)]
pub struct FrameProcessor {
    catalog: MarkerCatalog,
    resolver: PoseResolver<PlanarPoseSolver>,
    presence: PresenceTracker,
    config: FrameConfig,
    frames: u64,
}

impl FrameProcessor {
    pub fn new(catalog: MarkerCatalog, camera: CameraModel, config: FrameConfig) -> Self {
        let solver = PlanarPoseSolver::new(config.pose.clone());
        Self {
            catalog,
            resolver: PoseResolver::new(camera, solver),
            presence: PresenceTracker::new(),
            config,
            frames: 0,
        }
    }

    #[inline]
    pub fn catalog(&self) -> &MarkerCatalog {
        &self.catalog
    }

    #[inline]
    pub fn camera(&self) -> &CameraModel {
        self.resolver.camera()
    }

    #[inline]
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    #[inline]
    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    /// Forget every present marker and restart frame numbering.
    pub fn reset(&mut self) {
        self.presence.clear();
        self.frames = 0;
    }

    /// Process one frame given its grayscale image and candidate quads.
    ///
    /// No candidate failure aborts the frame; each is recorded in
    /// [`FrameReport::candidates`].
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, image, quads),
            fields(frame = self.frames, width = image.width, height = image.height, quads = quads.len())
        )
    )]
    pub fn process_frame(&mut self, image: &GrayImageView<'_>, quads: &[Quad]) -> FrameReport {
        let matcher = MarkerMatcher::new(&self.catalog);
        let mut candidates = Vec::with_capacity(quads.len());
        let mut observations = Vec::new();
        let mut detections = DetectionSet::new();

        for (index, quad) in quads.iter().enumerate() {
            let outcome = match identify(&matcher, image, quad, &self.config) {
                Err(outcome) => outcome,
                Ok(marker) => {
                    let pose = match self.resolver.resolve_quad(marker.rotation_index, quad) {
                        Ok(pose) => Some(pose),
                        Err(err) if err.is_malformed_input() => {
                            warn!("candidate {index}: marker {} pose input: {err}", marker.id);
                            None
                        }
                        Err(err) => {
                            debug!("candidate {index}: marker {}: {err}", marker.id);
                            None
                        }
                    };
                    let overlay = pose.as_ref().and_then(|p| {
                        Overlay::for_marker(
                            marker.marker_type,
                            &p.projection,
                            self.config.overlay_scale,
                        )
                    });
                    if !detections.insert(marker.clone()) {
                        debug!("candidate {index}: marker {} already seen this frame", marker.id);
                    }
                    let outcome = CandidateOutcome::Matched {
                        id: marker.id,
                        rotation_index: marker.rotation_index,
                        pose_resolved: pose.is_some(),
                    };
                    observations.push(MarkerObservation {
                        marker,
                        quad: *quad,
                        pose,
                        overlay,
                    });
                    outcome
                }
            };
            candidates.push(CandidateReport {
                index,
                quad: *quad,
                outcome,
            });
        }

        let presence = self.presence.update(&detections);
        let frame_index = self.frames;
        self.frames += 1;
        debug!(
            "frame {frame_index}: {} candidates, {} markers, {} present",
            quads.len(),
            detections.len(),
            self.presence.len()
        );

        FrameReport {
            frame_index,
            candidates,
            observations,
            detections,
            presence,
        }
    }
}

/// Rectify, sample and match one quad. `Err` carries the terminal outcome.
fn identify(
    matcher: &MarkerMatcher<'_>,
    image: &GrayImageView<'_>,
    quad: &Quad,
    config: &FrameConfig,
) -> Result<DetectedMarker, CandidateOutcome> {
    if !config.quad_filter.accepts(quad) {
        return Err(CandidateOutcome::Rejected);
    }
    let patch = rectify_quad(image, quad, config.sampling.patch_size)
        .ok_or(CandidateOutcome::RectifyFailed)?;
    let grid = sample_marker_grid(&patch.view(), &config.sampling).map_err(|e| {
        warn!("grid sampling: {e}");
        CandidateOutcome::Malformed {
            reason: e.to_string(),
        }
    })?;
    match matcher.match_grid(&grid) {
        Ok(Some(marker)) => Ok(marker),
        Ok(None) => Err(CandidateOutcome::NoMatch),
        Err(e) => {
            warn!("marker match: {e}");
            Err(CandidateOutcome::Malformed {
                reason: e.to_string(),
            })
        }
    }
}
