use std::io::Write;

use canonical_error::{CanonicalError, internal_error, invalid_argument_error,
                      not_found_error, unavailable_error};
use fitrs::{Fits, FitsData};
use log::info;
use ureq::Agent;

use crate::cutout::{CutoutFetcher, CutoutRequest, ImageData};

// CDS hips2fits cutout service.
const HIPS2FITS_ENDPOINT: &str =
    "https://alasky.cds.unistra.fr/hips-image-services/hips2fits";

// Well above any cutout this tool requests (500x500 float64 is ~2 MB).
const MAX_PAYLOAD_BYTES: u64 = 64 * 1024 * 1024;

/// Fetches cutout images from the hips2fits service and decodes the FITS
/// payload's primary HDU.
pub struct Hips2FitsFetcher {
    agent: Agent,
    endpoint: String,
}

impl Hips2FitsFetcher {
    pub fn new() -> Self {
        Self::with_endpoint(HIPS2FITS_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: &str) -> Self {
        Hips2FitsFetcher{
            agent: Agent::new_with_defaults(),
            endpoint: endpoint.to_string(),
        }
    }
}

impl Default for Hips2FitsFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl CutoutFetcher for Hips2FitsFetcher {
    fn fetch(&self, request: &CutoutRequest)
             -> Result<ImageData, CanonicalError> {
        let url = format!(
            "{}?hips={}&object={}&ra={:.6}&dec={:.6}&fov={:.6}&width={}&height={}",
            self.endpoint,
            urlencoding::encode(&request.survey),
            urlencoding::encode(&request.object_label),
            request.coord.ra, request.coord.dec, request.fov_deg,
            request.width_px, request.height_px);
        info!("Fetching {}", url);
        let response = match self.agent.get(&url).call() {
            Ok(response) => response,
            Err(ureq::Error::StatusCode(code)) => {
                return Err(status_error(&request.survey, code));
            },
            Err(e) => {
                return Err(unavailable_error(
                    format!("Cutout service unreachable: {}", e).as_str()));
            },
        };
        let mut body = response.into_body();
        let bytes = body.with_config().limit(MAX_PAYLOAD_BYTES).read_to_vec()
            .map_err(|e| unavailable_error(
                format!("Reading cutout payload failed: {}", e).as_str()))?;
        decode_fits_image(&bytes)
    }
}

// The service reports an unknown survey (or otherwise bad request) as a 4xx
// status; anything else is a service-side problem.
fn status_error(survey: &str, code: u16) -> CanonicalError {
    if (400..500).contains(&code) {
        not_found_error(format!(
            "Cutout service rejected survey '{}' (HTTP {})",
            survey, code).as_str())
    } else {
        unavailable_error(format!(
            "Cutout service error (HTTP {})", code).as_str())
    }
}

fn decode_fits_image(payload: &[u8]) -> Result<ImageData, CanonicalError> {
    // fitrs reads from a path, so spool the payload to a temp file.
    let mut tmp = tempfile::NamedTempFile::new().map_err(
        |e| internal_error(
            format!("Could not create temp file: {}", e).as_str()))?;
    tmp.write_all(payload).map_err(
        |e| internal_error(
            format!("Could not write temp file: {}", e).as_str()))?;
    let fits = Fits::open(tmp.path()).map_err(
        |e| invalid_argument_error(
            format!("Cutout payload is not a FITS image: {}", e).as_str()))?;
    image_data_from_fits(&fits)
}

fn image_data_from_fits(fits: &Fits) -> Result<ImageData, CanonicalError> {
    let hdu = fits.get(0).ok_or_else(
        || invalid_argument_error("FITS payload has no primary HDU"))?;
    let (shape, samples): (Vec<usize>, Vec<f32>) = match hdu.read_data() {
        FitsData::FloatingPoint32(arr) => (arr.shape.clone(), arr.data.clone()),
        FitsData::FloatingPoint64(arr) =>
            (arr.shape.clone(), arr.data.iter().map(|v| *v as f32).collect()),
        // Integer surveys use blank (absent) pixels for missing data; carry
        // them as NaN so display normalization can ignore them.
        FitsData::IntegersI32(arr) =>
            (arr.shape.clone(),
             arr.data.iter()
                 .map(|v| v.map(|x| x as f32).unwrap_or(f32::NAN)).collect()),
        FitsData::IntegersU32(arr) =>
            (arr.shape.clone(),
             arr.data.iter()
                 .map(|v| v.map(|x| x as f32).unwrap_or(f32::NAN)).collect()),
        FitsData::Characters(_) => {
            return Err(invalid_argument_error(
                "FITS primary HDU holds character data, not an image"));
        },
    };
    // Shape is in NAXIS order: width, height, then any degenerate axes.
    let (width, height) = match shape.len() {
        2 => (shape[0], shape[1]),
        3 if shape[2] == 1 => (shape[0], shape[1]),
        _ => {
            return Err(invalid_argument_error(
                format!("Unsupported FITS image shape {:?}", shape).as_str()));
        },
    };
    if width == 0 || height == 0 || samples.len() != width * height {
        return Err(internal_error(
            format!("FITS data length {} does not match shape {:?}",
                    samples.len(), shape).as_str()));
    }
    Ok(ImageData{width, height, samples})
}

// mod tests.
