use crate::regions::Region;

#[derive(Debug, Clone)]
pub struct OcrResult {
    /// Region in original-image pixel coordinates.
    pub bounds: Region,
    pub text: DecodeResult,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeResult {
    pub text: String,
    /// Mean of `character_scores`, or 0 when nothing was decoded.
    pub confidence: f32,
    pub character_scores: Vec<f32>,
}
