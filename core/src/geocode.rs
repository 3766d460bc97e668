//! Reverse geocoding boundary. Optional and best effort: a failure leaves
//! the complaint's locality unset.

use crate::types::Locality;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoder unavailable: {0}")]
    Unavailable(String),
    #[error("no locality for ({lat}, {lon})")]
    NoMatch { lat: f64, lon: f64 },
}

pub trait Geocoder: Send + Sync {
    fn reverse(&self, lat: f64, lon: f64) -> Result<Locality, GeocodeError>;
}

/// Resolve a locality, or an empty one on any failure.
pub fn locality_or_default(geocoder: Option<&dyn Geocoder>, lat: Option<f64>, lon: Option<f64>) -> Locality {
    let (Some(geocoder), Some(lat), Some(lon)) = (geocoder, lat, lon) else {
        return Locality::default();
    };
    match geocoder.reverse(lat, lon) {
        Ok(locality) => locality,
        Err(e) => {
            log::warn!("Reverse geocoding ({lat}, {lon}) failed: {e}");
            Locality::default()
        }
    }
}

/// Fixed answer for every coordinate. Useful in tests and demos.
#[derive(Debug, Clone, Default)]
pub struct StaticGeocoder(pub Locality);

impl Geocoder for StaticGeocoder {
    fn reverse(&self, _lat: f64, _lon: f64) -> Result<Locality, GeocodeError> {
        Ok(self.0.clone())
    }
}
