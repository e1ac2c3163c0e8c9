//! Location resolution: the postal-code index, reverse geocoding, nearby
//! places, and the resolver that combines them.

pub mod error;
pub mod geocoder;
pub mod places;
pub mod postal_index;
pub mod resolver;

pub use error::GeoError;
pub use geocoder::{GeocodeResult, GoogleGeocoder, ReverseGeocoder};
pub use places::{place_type, GooglePlacesClient, NearbyPlace, NearbyPlacesProvider};
pub use postal_index::{read_csv_records, LoadReport, PostalIndex};
pub use resolver::{in_service_area, GeoResolver, SERVICE_COUNTRY};
