use log::{debug, info};

use canonical_error::{CanonicalError, internal_error, invalid_argument_error,
                      not_found_error, unavailable_error};
use ureq::Agent;

use crate::astro_util::{Frame, SkyCoord, format_dec_dms, format_ra_hms};
use crate::resolver_trait::{NameResolver, TargetInfo};

// CDS Sesame resolver, plain-text output mode.
const SESAME_ENDPOINT: &str = "https://cds.unistra.fr/cgi-bin/nph-sesame/-op/S";

// SIMBAD TAP synchronous query endpoint.
const SIMBAD_TAP_ENDPOINT: &str = "https://simbad.cds.unistra.fr/simbad/sim-tap/sync";

/// Resolves target identifiers against the CDS Sesame service (position) and
/// the SIMBAD TAP service (canonical designation and classification).
pub struct SimbadResolver {
    agent: Agent,
    sesame_url: String,
    tap_url: String,
}

impl SimbadResolver {
    pub fn new() -> Self {
        Self::with_endpoints(SESAME_ENDPOINT, SIMBAD_TAP_ENDPOINT)
    }

    // Custom endpoints, e.g. a mirror or a local stub.
    pub fn with_endpoints(sesame_url: &str, tap_url: &str) -> Self {
        SimbadResolver{
            agent: Agent::new_with_defaults(),
            sesame_url: sesame_url.to_string(),
            tap_url: tap_url.to_string(),
        }
    }

    fn lookup_coordinates(&self, target_id: &str)
                          -> Result<SkyCoord, CanonicalError> {
        let url = format!("{}?{}", self.sesame_url,
                          urlencoding::encode(target_id));
        debug!("Sesame query: {}", url);
        let response = self.agent.get(&url).call().map_err(
            |e| transport_error("Sesame query failed", e))?;
        let body = response.into_body().read_to_string().map_err(
            |e| transport_error("Reading Sesame response failed", e))?;
        parse_sesame_response(&body, target_id)
    }

    fn query_catalog(&self, target_id: &str)
                     -> Result<(String, String, String), CanonicalError> {
        let adql = format!(
            "SELECT basic.main_id, basic.otype, basic.sp_type \
             FROM basic JOIN ident ON ident.oidref = basic.oid \
             WHERE ident.id = '{}'",
            target_id.replace('\'', "''"));
        let url = format!("{}?request=doQuery&lang=adql&format=json&query={}",
                          self.tap_url, urlencoding::encode(&adql));
        debug!("SIMBAD TAP query: {}", url);
        let response = self.agent.get(&url).call().map_err(
            |e| transport_error("SIMBAD query failed", e))?;
        let body = response.into_body().read_to_string().map_err(
            |e| transport_error("Reading SIMBAD response failed", e))?;
        parse_tap_response(&body, target_id)
    }
}

impl Default for SimbadResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl NameResolver for SimbadResolver {
    fn resolve(&self, target_id: &str, frame: &str)
               -> Result<TargetInfo, CanonicalError> {
        if target_id.trim().is_empty() {
            return Err(invalid_argument_error("Target identifier is empty"));
        }
        let frame = frame.parse::<Frame>()?;
        let coord = self.lookup_coordinates(target_id)?;
        let (canonical_id, object_type, spectral_type) =
            self.query_catalog(target_id)?;
        info!("Resolved '{}' to {} ({} {}) at RA {} Dec {}",
              target_id, canonical_id, object_type,
              if spectral_type.is_empty() { "-" } else { spectral_type.as_str() },
              format_ra_hms(coord.ra), format_dec_dms(coord.dec));
        Ok(TargetInfo{
            query_id: target_id.to_string(),
            canonical_id,
            object_type,
            spectral_type,
            frame,
            coord,
        })
    }
}

fn transport_error(context: &str, e: ureq::Error) -> CanonicalError {
    match e {
        ureq::Error::StatusCode(code) => unavailable_error(
            format!("{}: HTTP status {}", context, code).as_str()),
        e => unavailable_error(format!("{}: {}", context, e).as_str()),
    }
}

// Sesame's plain-text output carries the resolved J2000 position on a line
// of the form "%J 279.23473479 +38.78368896 = 18:36:56.33 +38:47:01.2".
// Unresolved identifiers yield "#!" diagnostic lines instead.
fn parse_sesame_response(body: &str, target_id: &str)
                         -> Result<SkyCoord, CanonicalError> {
    for line in body.lines() {
        if let Some(rest) = line.strip_prefix("%J ") {
            let mut fields = rest.split_whitespace();
            let ra = fields.next().and_then(|v| v.parse::<f64>().ok());
            let dec = fields.next().and_then(|v| v.parse::<f64>().ok());
            if let (Some(ra), Some(dec)) = (ra, dec) {
                return Ok(SkyCoord::new(ra, dec));
            }
            return Err(internal_error(
                format!("Malformed Sesame position line: '{}'", line).as_str()));
        }
    }
    for line in body.lines() {
        if let Some(msg) = line.strip_prefix("#!") {
            return Err(not_found_error(
                format!("Could not resolve '{}': {}",
                        target_id, msg.trim()).as_str()));
        }
    }
    Err(not_found_error(
        format!("Sesame returned no position for '{}'", target_id).as_str()))
}

// TAP json output: {"metadata": [...], "data": [[main_id, otype, sp_type]]}.
// Cells may be null (sp_type usually is, for non-stellar objects).
fn parse_tap_response(body: &str, target_id: &str)
                      -> Result<(String, String, String), CanonicalError> {
    let doc: serde_json::Value = serde_json::from_str(body).map_err(
        |e| internal_error(
            format!("Malformed SIMBAD response: {}", e).as_str()))?;
    let rows = doc.get("data").and_then(|d| d.as_array()).ok_or_else(
        || internal_error("SIMBAD response has no data section"))?;
    let row = rows.first().ok_or_else(
        || not_found_error(
            format!("SIMBAD has no record for '{}'", target_id).as_str()))?;
    let cell = |index: usize| -> String {
        row.get(index).and_then(|v| v.as_str()).unwrap_or("").trim().to_string()
    };
    let mut canonical_id = cell(0);
    if canonical_id.is_empty() {
        canonical_id = target_id.to_string();
    }
    Ok((canonical_id, cell(1), cell(2)))
}

// mod tests.
