//! Decide from a photo whether a chair fits through a door.
//!
//! Two independent estimators measure widths as fractions of the image
//! width:
//!
//! - [`estimate_chair_width`] matches ORB features of the photo against a
//!   [`TemplateCatalog`] and measures the spread of matched keypoints in the
//!   seat region;
//! - [`estimate_door_width`] thresholds the photo with Sauvola, runs a Hough
//!   transform and measures the spread of near-vertical lines.
//!
//! [`decide`] compares the two and [`evaluate_dataset`] scores a labelled
//! dataset. The heavy lifting on raw buffers lives in [`chairfit_core`],
//! re-exported here.
//!
//! ```no_run
//! use chairfit::{
//!     decide, estimate_chair_width, estimate_door_width, EstimationContext, Hyperparameters,
//!     TemplateCatalog,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let photo = image::open("photo.jpg")?.to_rgb8();
//! let catalog = TemplateCatalog::new(vec![image::open("chair.jpg")?.to_rgb8()])?;
//! let params = Hyperparameters::default();
//! let ctx = EstimationContext::silent("photo.jpg");
//!
//! let chair = estimate_chair_width(&photo, &catalog, &params, &ctx)?;
//! let door = estimate_door_width(&photo, &params, &ctx)?;
//! println!("fits: {}", decide(chair, door));
//! # Ok(())
//! # }
//! ```

pub use chairfit_core::*;

pub mod app;
pub mod chair;
pub mod dataset;
pub mod decision;
pub mod diagnostics;
pub mod door;
mod error;
pub mod features;
pub mod overlay;
mod params;
pub mod pyramid;

pub use crate::chair::{estimate_chair_width, select_best_template, seat_region_width, TemplateCatalog};
pub use crate::decision::{
    decide, evaluate_dataset, evaluate_image, CancelToken, DatasetImage, DatasetReport,
    ImageOutcome, ImageReport, Label,
};
pub use crate::diagnostics::{
    DiagnosticEvent, DiagnosticSink, EstimationContext, MemorySink, NullSink, TracingSink,
};
pub use crate::door::{binarize, door_width_from_lines, estimate_door_width};
pub use crate::error::EstimateError;
pub use crate::features::{detect_and_compute, OrbFeatures};
pub use crate::params::Hyperparameters;
