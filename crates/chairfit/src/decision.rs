//! Fit decision per image and accuracy over a labelled dataset.

use crate::chair::{estimate_chair_width, TemplateCatalog};
use crate::diagnostics::EstimationContext;
use crate::door::estimate_door_width;
use crate::error::EstimateError;
use crate::params::Hyperparameters;
use image::RgbImage;
use serde::{Deserialize, Serialize, Serializer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Whether the chair fits through the door.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Yes,
    No,
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Label::Yes => "yes",
            Label::No => "no",
        })
    }
}

/// `Yes` iff the chair is not wider than the door.
pub fn decide(chair_width: f32, door_width: f32) -> Label {
    if chair_width <= door_width {
        Label::Yes
    } else {
        Label::No
    }
}

/// A labelled photo of a chair next to a door.
#[derive(Clone, Debug)]
pub struct DatasetImage {
    pub file_name: String,
    pub image: RgbImage,
    pub label: Label,
}

/// Result of evaluating one image.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImageOutcome {
    Decided {
        chair_width: f32,
        door_width: f32,
        predicted: Label,
        expected: Label,
    },
    Undetermined {
        #[serde(serialize_with = "display")]
        reason: EstimateError,
    },
}

fn display<S: Serializer>(err: &EstimateError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(err)
}

impl ImageOutcome {
    pub fn is_correct(&self) -> bool {
        matches!(self, ImageOutcome::Decided { predicted, expected, .. } if predicted == expected)
    }
}

/// One row of a dataset report.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ImageReport {
    pub file_name: String,
    #[serde(flatten)]
    pub outcome: ImageOutcome,
}

/// Summary of a dataset evaluation.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DatasetReport {
    /// Per-image outcomes in input order.
    pub images: Vec<ImageReport>,
    pub correct: usize,
    pub decided: usize,
    pub undetermined: usize,
    /// `correct / decided`; `None` when nothing was decided.
    pub accuracy: Option<f64>,
    /// Set when the run stopped early on request.
    pub cancelled: bool,
}

impl DatasetReport {
    fn push(&mut self, file_name: String, outcome: ImageOutcome) {
        match &outcome {
            ImageOutcome::Decided { .. } => {
                self.decided += 1;
                if outcome.is_correct() {
                    self.correct += 1;
                }
            }
            ImageOutcome::Undetermined { .. } => self.undetermined += 1,
        }
        self.accuracy = (self.decided > 0).then(|| self.correct as f64 / self.decided as f64);
        self.images.push(ImageReport { file_name, outcome });
    }
}

/// Cooperative cancellation flag checked between images.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Run both estimators on one image and compare against `expected`.
///
/// Estimation failures never propagate; they make the image undetermined.
pub fn evaluate_image(
    image: &RgbImage,
    expected: Label,
    templates: &TemplateCatalog,
    params: &Hyperparameters,
    ctx: &EstimationContext,
) -> ImageOutcome {
    let widths = estimate_chair_width(image, templates, params, ctx)
        .and_then(|chair| estimate_door_width(image, params, ctx).map(|door| (chair, door)));

    match widths {
        Ok((chair_width, door_width)) => {
            let predicted = decide(chair_width, door_width);
            info!(
                image = ctx.image_name,
                chair_width,
                door_width,
                %predicted,
                %expected,
                "image decided"
            );
            ImageOutcome::Decided {
                chair_width,
                door_width,
                predicted,
                expected,
            }
        }
        Err(reason) => {
            warn!(image = ctx.image_name, %reason, "image undetermined");
            ImageOutcome::Undetermined { reason }
        }
    }
}

/// Evaluate every image in order.
///
/// `make_ctx` builds the diagnostics context for each image from its file
/// name. `cancel` is checked before each image; a cancelled run returns the
/// outcomes gathered so far with `cancelled` set.
pub fn evaluate_dataset<'a, F>(
    images: &'a [DatasetImage],
    templates: &TemplateCatalog,
    params: &Hyperparameters,
    make_ctx: F,
    cancel: &CancelToken,
) -> DatasetReport
where
    F: Fn(&'a str) -> EstimationContext<'a>,
{
    let mut report = DatasetReport::default();
    for item in images {
        if cancel.is_cancelled() {
            warn!(processed = report.images.len(), "evaluation cancelled");
            report.cancelled = true;
            break;
        }
        let ctx = make_ctx(&item.file_name);
        let outcome = evaluate_image(&item.image, item.label, templates, params, &ctx);
        report.push(item.file_name.clone(), outcome);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decide_is_inclusive() {
        assert_eq!(decide(0.25, 0.75), Label::Yes);
        assert_eq!(decide(0.80, 0.75), Label::No);
        assert_eq!(decide(0.5, 0.5), Label::Yes);
    }

    #[test]
    fn report_counts_and_accuracy() {
        let mut report = DatasetReport::default();
        assert_eq!(report.accuracy, None);

        report.push(
            "a".into(),
            ImageOutcome::Undetermined {
                reason: EstimateError::NoMatchFound,
            },
        );
        assert_eq!(report.accuracy, None);

        report.push(
            "b".into(),
            ImageOutcome::Decided {
                chair_width: 0.2,
                door_width: 0.5,
                predicted: Label::Yes,
                expected: Label::Yes,
            },
        );
        report.push(
            "c".into(),
            ImageOutcome::Decided {
                chair_width: 0.7,
                door_width: 0.5,
                predicted: Label::No,
                expected: Label::Yes,
            },
        );
        assert_eq!(report.decided, 2);
        assert_eq!(report.correct, 1);
        assert_eq!(report.undetermined, 1);
        assert_eq!(report.accuracy, Some(0.5));
    }

    #[test]
    fn outcomes_serialize_with_reason_text() {
        let row = ImageReport {
            file_name: "test/3.jpg".into(),
            outcome: ImageOutcome::Undetermined {
                reason: EstimateError::NoVerticalLineFound,
            },
        };
        let v = serde_json::to_value(&row).unwrap();
        assert_eq!(v["status"], "undetermined");
        assert_eq!(v["reason"], "no near-vertical line found");
        assert_eq!(v["file_name"], "test/3.jpg");
    }

    #[test]
    fn labels_use_lowercase_names() {
        assert_eq!(serde_json::to_string(&Label::Yes).unwrap(), "\"yes\"");
        let l: Label = serde_json::from_str("\"no\"").unwrap();
        assert_eq!(l, Label::No);
    }

    #[test]
    fn cancel_token_is_shared() {
        let a = CancelToken::new();
        let b = a.clone();
        assert!(!b.is_cancelled());
        a.cancel();
        assert!(b.is_cancelled());
    }
}
