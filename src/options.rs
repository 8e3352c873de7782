use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionOptions {
    /// Side of the square detection input.
    pub max_side_len: u32,
    /// Binarization threshold on the probability map.
    pub det_db_thresh: f32,
    /// Minimum mean probability for a region to be kept.
    pub det_db_box_thresh: f32,
    pub det_db_unclip_ratio: f32,
    pub det_db_use_dilate: bool,
    /// Connected components with a shorter rectangle side are discarded.
    pub min_region_side: f64,
    /// Unclipped polygons with a shorter side are discarded.
    pub min_box_side: f64,
    pub max_candidates: usize,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            max_side_len: 960,
            det_db_thresh: 0.3,
            det_db_box_thresh: 0.5,
            det_db_unclip_ratio: 1.5,
            det_db_use_dilate: false,
            min_region_side: 2.0,
            min_box_side: 3.0,
            max_candidates: 1000,
        }
    }
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::Config(format!("{name} must be in [0, 1], got {value}")))
    }
}

fn check_non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::Config(format!("{name} must be non-negative, got {value}")))
    }
}

impl DetectionOptions {
    pub fn validate(&self) -> Result<()> {
        if self.max_side_len == 0 {
            return Err(Error::Config("max_side_len must be positive".into()));
        }
        check_unit("det_db_thresh", self.det_db_thresh)?;
        check_unit("det_db_box_thresh", self.det_db_box_thresh)?;
        if !(self.det_db_unclip_ratio.is_finite() && self.det_db_unclip_ratio > 0.0) {
            return Err(Error::Config(format!(
                "det_db_unclip_ratio must be positive, got {}",
                self.det_db_unclip_ratio
            )));
        }
        check_non_negative("min_region_side", self.min_region_side)?;
        check_non_negative("min_box_side", self.min_box_side)?;
        if self.max_candidates == 0 {
            return Err(Error::Config("max_candidates must be positive".into()));
        }
        Ok(())
    }

    /// Builds options from legacy `name → number` pairs, starting from the
    /// defaults. Unknown names are rejected.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>) -> Result<Self> {
        let mut options = Self::default();
        for (name, value) in pairs {
            match name {
                "max_side_len" => {
                    if value.fract() != 0.0 || value < 1.0 || value > u32::MAX as f64 {
                        return Err(Error::Config(format!(
                            "max_side_len must be a positive integer, got {value}"
                        )));
                    }
                    options.max_side_len = value as u32;
                }
                "det_db_thresh" => options.det_db_thresh = value as f32,
                "det_db_box_thresh" => options.det_db_box_thresh = value as f32,
                "det_db_unclip_ratio" => options.det_db_unclip_ratio = value as f32,
                "det_db_use_dilate" => {
                    options.det_db_use_dilate = if value == 0.0 {
                        false
                    } else if value == 1.0 {
                        true
                    } else {
                        return Err(Error::Config(format!(
                            "det_db_use_dilate must be 0 or 1, got {value}"
                        )));
                    }
                }
                other => return Err(Error::Config(format!("unknown option {other}"))),
            }
        }
        options.validate()?;
        Ok(options)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecognitionOptions {
    /// Height the rectified patch is resized to before recognition.
    pub image_height: u32,
    /// Patches with fewer pixels are not recognized.
    pub min_patch_area: u32,
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self {
            image_height: 48,
            min_patch_area: 100,
        }
    }
}

impl RecognitionOptions {
    pub fn validate(&self) -> Result<()> {
        if self.image_height == 0 {
            return Err(Error::Config("image_height must be positive".into()));
        }
        Ok(())
    }
}
