//! Provenance header and the persisted segmentation record.
//!
//! Every field of [`AcweHeader`] is required when deserializing, so a record
//! written by an incompatible version fails to load instead of silently
//! picking up defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::field::Mask;
use crate::resample::upscaled_dimensions;
use crate::sweep::SegmentationStack;

/// Settings and seed a segmentation run was produced with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcweHeader {
    pub correct_limb_brightening: bool,
    /// Free-form label of preprocessing applied before this crate saw the image.
    pub image_preprocess: Option<String>,
    /// Downsampling factor between native and working resolution.
    pub resize_param: u32,
    pub foreground_weight: f64,
    /// Background weights in the order the stack entries use.
    pub background_weights: Vec<f64>,
    /// Seed at working resolution, before hole filling.
    pub init_mask: Mask,
    pub init_mask_method: String,
    pub fill_init_holes: bool,
    /// Alpha requested by the seed config.
    pub init_alpha: f64,
    /// Alpha the seed was actually built with.
    pub alpha: f64,
    pub narrowband: u32,
    pub iters_between_checks: usize,
}

impl AcweHeader {
    /// Working-resolution dimensions `(width, height)`.
    pub fn working_dimensions(&self) -> (u32, u32) {
        self.init_mask.dimensions()
    }
}

#[derive(Debug)]
pub enum RecordError {
    Io(std::io::Error),
    Json(serde_json::Error),
    /// The record parsed but its parts disagree with each other.
    Inconsistent(String),
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "record I/O failed: {}", e),
            Self::Json(e) => write!(f, "record JSON is invalid: {}", e),
            Self::Inconsistent(msg) => write!(f, "inconsistent record: {}", msg),
        }
    }
}

impl std::error::Error for RecordError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Inconsistent(_) => None,
        }
    }
}

impl From<std::io::Error> for RecordError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for RecordError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// A sweep's stack together with the header describing how it was made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationRecord {
    pub header: AcweHeader,
    pub stack: SegmentationStack,
}

impl SegmentationRecord {
    /// Check that every stored mask matches the seed's dimensions, that the
    /// header's weight list matches the stack and that the native-resolution
    /// size `working_dimensions * resize_param` is representable.
    pub fn validate(&self) -> Result<(), RecordError> {
        let dims = self.header.working_dimensions();
        let rp = self.header.resize_param;
        if rp < 1 || upscaled_dimensions(dims.0, dims.1, rp).is_none() {
            return Err(RecordError::Inconsistent(format!(
                "resize_param {} does not scale a {}x{} seed to a valid image",
                rp, dims.0, dims.1
            )));
        }
        if self.header.background_weights.len() != self.stack.len() {
            return Err(RecordError::Inconsistent(format!(
                "header lists {} background weights, stack has {} entries",
                self.header.background_weights.len(),
                self.stack.len()
            )));
        }
        for (i, entry) in self.stack.entries.iter().enumerate() {
            if let Some(mask) = &entry.segmentation {
                if mask.dimensions() != dims {
                    return Err(RecordError::Inconsistent(format!(
                        "entry {} is {}x{}, seed is {}x{}",
                        i,
                        mask.width(),
                        mask.height(),
                        dims.0,
                        dims.1
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn save_json(&self, path: &Path) -> Result<(), RecordError> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_json(path: &Path) -> Result<Self, RecordError> {
        let data = std::fs::read_to_string(path)?;
        let record: Self = serde_json::from_str(&data)?;
        record.validate()?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::SegmentOutcome;
    use crate::sweep::StackEntry;

    fn sample_record() -> SegmentationRecord {
        let init = Mask::disk(12, 10, [5.0, 5.0], 2.0);
        let entry = |weight: f64, r: f64| StackEntry {
            weight,
            segmentation: Some(Mask::disk(12, 10, [5.0, 5.0], r)),
            outcome: Some(SegmentOutcome::Converged { batches: 3 }),
            failure: None,
        };
        SegmentationRecord {
            header: AcweHeader {
                correct_limb_brightening: true,
                image_preprocess: None,
                resize_param: 8,
                foreground_weight: 1.0,
                background_weights: vec![0.1, 0.5, 0.2],
                init_mask: init,
                init_mask_method: "alpha*qs".to_string(),
                fill_init_holes: true,
                init_alpha: 0.3,
                alpha: 0.3,
                narrowband: 2,
                iters_between_checks: 10,
            },
            stack: SegmentationStack {
                entries: vec![
                    entry(0.1, 2.0),
                    StackEntry {
                        weight: 0.5,
                        segmentation: None,
                        outcome: None,
                        failure: Some("evolution diverged".to_string()),
                    },
                    entry(0.2, 3.0),
                ],
            },
        }
    }

    #[test]
    fn record_survives_a_file_round_trip() {
        let record = sample_record();
        let path = std::env::temp_dir().join(format!("acwe-record-{}.json", std::process::id()));
        record.save_json(&path).unwrap();
        let loaded = SegmentationRecord::load_json(&path);
        let _ = std::fs::remove_file(&path);
        let loaded = loaded.unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.stack.n_failed(), 1);
        assert_eq!(loaded.header.working_dimensions(), (12, 10));
    }

    #[test]
    fn missing_header_field_is_rejected() {
        let mut value = serde_json::to_value(sample_record()).unwrap();
        value["header"]
            .as_object_mut()
            .unwrap()
            .remove("resize_param");
        let parsed: Result<SegmentationRecord, _> = serde_json::from_value(value);
        assert!(parsed.is_err());
    }

    #[test]
    fn mismatched_stack_is_inconsistent() {
        let mut record = sample_record();
        record.header.background_weights.pop();
        assert!(matches!(record.validate(), Err(RecordError::Inconsistent(_))));

        let mut record = sample_record();
        record.stack.entries[0].segmentation = Some(Mask::new(4, 4));
        assert!(matches!(record.validate(), Err(RecordError::Inconsistent(_))));
    }

    #[test]
    fn out_of_range_resize_param_is_inconsistent() {
        for rp in [0, u32::MAX / 4] {
            let mut record = sample_record();
            record.header.resize_param = rp;
            assert!(
                matches!(record.validate(), Err(RecordError::Inconsistent(_))),
                "resize_param {rp}"
            );
        }
        let mut record = sample_record();
        record.header.resize_param = 1000;
        assert!(record.validate().is_ok());
    }

    #[test]
    fn missing_file_is_io_error() {
        let path = std::env::temp_dir().join("acwe-record-does-not-exist.json");
        assert!(matches!(
            SegmentationRecord::load_json(&path),
            Err(RecordError::Io(_))
        ));
    }
}
