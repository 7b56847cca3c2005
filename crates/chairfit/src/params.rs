//! Validated hyperparameter bundle shared by both estimators.

use crate::error::EstimateError;
use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

/// Fixed numeric constants of the estimators.
///
/// Fields are private: the only way to get a bundle is through
/// [`Hyperparameters::new`] (or `Default` / deserialization, which both go
/// through the same validation), so every live bundle is valid.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawHyperparameters")]
pub struct Hyperparameters {
    num_orb_features: u32,
    orb_match_distance: u32,
    vertical_line_hough_coeff: f32,
    chair_height_coeff: f32,
}

/// Unvalidated mirror of [`Hyperparameters`] used for deserialization.
#[derive(Clone, Copy, Debug, Deserialize)]
struct RawHyperparameters {
    num_orb_features: u32,
    orb_match_distance: u32,
    vertical_line_hough_coeff: f32,
    chair_height_coeff: f32,
}

impl TryFrom<RawHyperparameters> for Hyperparameters {
    type Error = EstimateError;

    fn try_from(raw: RawHyperparameters) -> Result<Self, Self::Error> {
        Hyperparameters::new(
            raw.num_orb_features,
            raw.orb_match_distance,
            raw.vertical_line_hough_coeff,
            raw.chair_height_coeff,
        )
    }
}

impl Hyperparameters {
    pub const DEFAULT_NUM_ORB_FEATURES: u32 = 8000;
    pub const DEFAULT_ORB_MATCH_DISTANCE: u32 = 70;
    pub const DEFAULT_VERTICAL_LINE_HOUGH_COEFF: f32 = 0.3;
    pub const DEFAULT_CHAIR_HEIGHT_COEFF: f32 = 0.5;

    /// Validate and build a bundle.
    ///
    /// - `num_orb_features` and `orb_match_distance` must be positive;
    /// - `vertical_line_hough_coeff` must lie in `[0, π/2]`;
    /// - `chair_height_coeff` must lie in `[0, 1]`.
    pub fn new(
        num_orb_features: u32,
        orb_match_distance: u32,
        vertical_line_hough_coeff: f32,
        chair_height_coeff: f32,
    ) -> Result<Self, EstimateError> {
        if num_orb_features == 0 {
            return Err(EstimateError::invalid(
                "num_orb_features",
                num_orb_features,
                "must be positive",
            ));
        }
        if orb_match_distance == 0 {
            return Err(EstimateError::invalid(
                "orb_match_distance",
                orb_match_distance,
                "must be positive",
            ));
        }
        if !(0.0..=FRAC_PI_2).contains(&vertical_line_hough_coeff) {
            return Err(EstimateError::invalid(
                "vertical_line_hough_coeff",
                vertical_line_hough_coeff,
                "must be within [0, pi/2] radians",
            ));
        }
        if !(0.0..=1.0).contains(&chair_height_coeff) {
            return Err(EstimateError::invalid(
                "chair_height_coeff",
                chair_height_coeff,
                "must be within [0, 1]",
            ));
        }

        Ok(Self {
            num_orb_features,
            orb_match_distance,
            vertical_line_hough_coeff,
            chair_height_coeff,
        })
    }

    /// Keypoint budget per ORB pass.
    pub fn num_orb_features(&self) -> u32 {
        self.num_orb_features
    }

    /// Largest Hamming distance accepted as a good match.
    pub fn orb_match_distance(&self) -> u32 {
        self.orb_match_distance
    }

    /// Angular tolerance (radians) for a line to count as vertical.
    pub fn vertical_line_hough_coeff(&self) -> f32 {
        self.vertical_line_hough_coeff
    }

    /// Fraction of the image height, from the bottom, treated as seat region.
    pub fn chair_height_coeff(&self) -> f32 {
        self.chair_height_coeff
    }
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            num_orb_features: Self::DEFAULT_NUM_ORB_FEATURES,
            orb_match_distance: Self::DEFAULT_ORB_MATCH_DISTANCE,
            vertical_line_hough_coeff: Self::DEFAULT_VERTICAL_LINE_HOUGH_COEFF,
            chair_height_coeff: Self::DEFAULT_CHAIR_HEIGHT_COEFF,
        }
    }
}
