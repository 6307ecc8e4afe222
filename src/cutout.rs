// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use canonical_error::CanonicalError;

use crate::astro_util::SkyCoord;
use crate::resolver_trait::TargetInfo;

pub const DEFAULT_WIDTH_PX: u32 = 500;
pub const DEFAULT_HEIGHT_PX: u32 = 500;

/// Fully specified cutout-service request. Construction is pure; an unknown
/// survey identifier is only detected when the request is fetched.
#[derive(Clone, Debug, PartialEq)]
pub struct CutoutRequest {
    /// Survey (HiPS dataset) identifier, e.g. "DSS".
    pub survey: String,

    /// Label passed through to the service; echoes the caller's identifier.
    pub object_label: String,

    /// Center of the cutout, ICRS degrees.
    pub coord: SkyCoord,

    /// Angular width of the cutout, degrees.
    pub fov_deg: f64,

    pub width_px: u32,
    pub height_px: u32,
}

impl CutoutRequest {
    pub fn new(target: &TargetInfo, survey: &str, fov_deg: f64,
               width_px: u32, height_px: u32) -> Self {
        assert!(fov_deg.is_finite() && fov_deg > 0.0);
        assert!(target.coord.ra.is_finite() && target.coord.dec.is_finite());
        CutoutRequest{
            survey: survey.to_string(),
            object_label: target.query_id.clone(),
            coord: target.coord,
            fov_deg,
            width_px,
            height_px,
        }
    }
}

/// Decoded cutout image: a row-major f32 sample buffer. Rows are in FITS
/// order, i.e. row 0 is the bottom of the sky image. Samples may be
/// non-finite (blank pixels in floating-point surveys).
#[derive(Clone, Debug)]
pub struct ImageData {
    pub width: usize,
    pub height: usize,
    pub samples: Vec<f32>,
}

impl ImageData {
    pub fn sample(&self, x: usize, y: usize) -> f32 {
        self.samples[y * self.width + x]
    }
}

// If ImageData is not returned, an error is returned:
//   InvalidArgument: the service rejected the request (e.g. unknown survey),
//     or the payload is not a FITS image.
//   NotFound: the service has nothing for the request.
//   Unavailable: the cutout service could not be reached.
pub trait CutoutFetcher {
    // Note: this is a blocking call; one HTTP round-trip per invocation, no
    // retry and no caching.
    fn fetch(&self, request: &CutoutRequest) -> Result<ImageData, CanonicalError>;
}

#[cfg(test)]
mod tests {
    use crate::astro_util::Frame;
    use super::*;

    fn test_target() -> TargetInfo {
        TargetInfo{
            query_id: "Vega".to_string(),
            canonical_id: "* alf Lyr".to_string(),
            object_type: "PM*".to_string(),
            spectral_type: "A0Va".to_string(),
            frame: Frame::Icrs,
            coord: SkyCoord::new(279.23473479, 38.78368896),
        }
    }

    #[test]
    fn test_build_is_pure() {
        let target = test_target();
        let a = CutoutRequest::new(&target, "DSS", 1.0,
                                   DEFAULT_WIDTH_PX, DEFAULT_HEIGHT_PX);
        let b = CutoutRequest::new(&target, "DSS", 1.0,
                                   DEFAULT_WIDTH_PX, DEFAULT_HEIGHT_PX);
        assert_eq!(a, b);
    }

    #[test]
    fn test_build_echoes_query_id() {
        let target = test_target();
        let req = CutoutRequest::new(&target, "2MASS/J", 0.25, 300, 200);
        assert_eq!(req.object_label, "Vega");
        assert_eq!(req.survey, "2MASS/J");
        assert_eq!(req.coord, target.coord);
        assert_eq!(req.width_px, 300);
        assert_eq!(req.height_px, 200);
    }

    #[test]
    fn test_image_data_indexing() {
        let data = ImageData{width: 3, height: 2,
                             samples: vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]};
        assert_eq!(data.sample(0, 0), 0.0);
        assert_eq!(data.sample(2, 0), 2.0);
        assert_eq!(data.sample(0, 1), 3.0);
        assert_eq!(data.sample(2, 1), 5.0);
    }

}  // mod tests.
