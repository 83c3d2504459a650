use crate::search::NormalisedRequest;
use sha2::{Digest, Sha256};
use std::fmt::{self, Write};

/// Separator between canonical fields (ASCII unit separator).
pub const FIELD_SEPARATOR: u8 = 0x1F;

const NO_RETURN: &str = "-";

/// Cache key for a request's equivalence class.
///
/// Built from origin, destination, departure, return, trip type,
/// passenger count and cabin only; filters and presentation choices are
/// applied after the cache so they never split an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    canonical: Vec<u8>,
    digest: String,
}

impl Fingerprint {
    pub fn of(request: &NormalisedRequest) -> Self {
        let return_date = request
            .return_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| NO_RETURN.to_string());

        let fields = [
            request.origin.as_str().to_ascii_uppercase(),
            request.destination.as_str().to_ascii_uppercase(),
            request.departure_date.format("%Y-%m-%d").to_string(),
            return_date,
            request.trip_type.as_str().to_string(),
            request.passengers.to_string(),
            request.cabin.as_str().to_string(),
        ];

        let mut canonical = Vec::with_capacity(48);
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                canonical.push(FIELD_SEPARATOR);
            }
            canonical.extend_from_slice(field.as_bytes());
        }

        let hash = Sha256::digest(&canonical);
        let mut digest = String::with_capacity(64);
        for byte in hash.iter() {
            let _ = write!(digest, "{:02x}", byte);
        }

        Self { canonical, digest }
    }

    /// The bit-exact canonical form.
    pub fn canonical_bytes(&self) -> &[u8] {
        &self.canonical
    }

    /// Lowercase hex SHA-256 of the canonical form.
    pub fn as_hex(&self) -> &str {
        &self.digest
    }

    /// Key used by shared storage backends.
    pub fn storage_key(&self, namespace: &str) -> String {
        format!("{}:{}", namespace, self.digest)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Twelve hex chars is plenty to tell entries apart in logs.
        f.write_str(&self.digest[..12])
    }
}
