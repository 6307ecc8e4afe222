// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use canonical_error::CanonicalError;

use crate::astro_util::{Frame, SkyCoord};

/// Identity of an imaging target, as resolved by a name-resolution catalog.
/// Fully populated on construction; a value of this type never represents a
/// partially-resolved target.
#[derive(Clone, Debug)]
pub struct TargetInfo {
    /// The identifier as given by the caller.
    pub query_id: String,

    /// The catalog's primary designation for the object.
    pub canonical_id: String,

    /// Catalog object type code, e.g. "PM*".
    pub object_type: String,

    /// Spectral type, e.g. "A0Va". Empty for objects without one.
    pub spectral_type: String,

    /// Frame requested by the caller.
    pub frame: Frame,

    /// Resolved position, ICRS degrees.
    pub coord: SkyCoord,
}

// If TargetInfo is not returned, an error is returned:
//   InvalidArgument: the identifier is empty, or the frame is unrecognized.
//   NotFound: the catalog does not know the identifier.
//   Unavailable: the resolution service could not be reached.
//   Internal: the service responded with something unparseable.
pub trait NameResolver {
    // Note: this is a blocking call. One round-trip to the coordinate
    // resolution service plus one catalog query; both are idempotent and
    // neither is retried.
    fn resolve(&self, target_id: &str, frame: &str)
               -> Result<TargetInfo, CanonicalError>;
}
