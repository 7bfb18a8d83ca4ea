use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::rules::geo::GeoPoint;

pub const SITE_COLUMNS: &str = "id, name, qr_token, latitude, longitude, radius_m, active, created_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Site {
    pub id: u64,
    #[schema(example = "Tuas Depot Block C")]
    pub name: String,
    /// Payload encoded in the site's QR code
    pub qr_token: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Geofence radius in metres
    #[schema(example = 150.0)]
    pub radius_m: f64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Site {
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}
