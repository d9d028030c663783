// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Strava activity model for storage and API.

use crate::services::strava::StravaActivitySummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored activity record, keyed by the Strava activity ID.
///
/// `created_at` is owned by the store: it is set on first insert and survives
/// every later upsert. `updated_at` is refreshed on every upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Strava activity ID (also used as document ID)
    pub id: u64,
    /// Strava athlete ID (owner)
    pub athlete_id: u64,
    pub name: String,
    /// Legacy activity type (Ride, Run, ...)
    pub activity_type: String,
    /// Sport type (Ride, MountainBikeRide, TrailRun, ...)
    pub sport_type: String,
    /// Distance in meters
    pub distance: f64,
    /// Moving time in seconds
    pub moving_time: u64,
    /// Elapsed time in seconds
    pub elapsed_time: u64,
    /// Total elevation gain in meters
    pub total_elevation_gain: f64,
    pub start_date: DateTime<Utc>,
    /// Local wall-clock start as reported by Strava (no offset)
    pub start_date_local: Option<String>,
    pub timezone: Option<String>,
    pub start_latlng: Option<LatLng>,
    pub end_latlng: Option<LatLng>,
    pub achievement_count: u32,
    pub kudos_count: u32,
    pub comment_count: u32,
    pub athlete_count: u32,
    pub photo_count: u32,
    pub map_id: Option<String>,
    pub summary_polyline: Option<String>,
    pub trainer: bool,
    pub commute: bool,
    pub manual: bool,
    pub private: bool,
    pub visibility: Option<String>,
    pub flagged: bool,
    pub workout_type: Option<i32>,
    /// Meters per second
    pub average_speed: f64,
    /// Meters per second
    pub max_speed: f64,
    pub has_heartrate: bool,
    pub average_heartrate: Option<f64>,
    pub max_heartrate: Option<f64>,
    pub elev_high: Option<f64>,
    pub elev_low: Option<f64>,
    pub upload_id: Option<u64>,
    pub external_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Why a provider record could not be turned into an [`Activity`].
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("activity {id}: invalid start_date {value:?}")]
    StartDate { id: u64, value: String },

    #[error("activity {id}: {field} is not a [lat, lng] pair")]
    LatLng { id: u64, field: &'static str },

    #[error("activity {id}: missing athlete")]
    MissingAthlete { id: u64 },
}

impl Activity {
    /// Map a provider summary onto the stored schema.
    ///
    /// Both timestamps are set to `now`; the store decides which of them survive.
    pub fn from_summary(
        summary: StravaActivitySummary,
        now: DateTime<Utc>,
    ) -> Result<Self, MappingError> {
        let id = summary.id;

        let start_date = DateTime::parse_from_rfc3339(&summary.start_date)
            .map_err(|_| MappingError::StartDate {
                id,
                value: summary.start_date.clone(),
            })?
            .with_timezone(&Utc);

        let athlete_id = summary
            .athlete
            .map(|a| a.id)
            .ok_or(MappingError::MissingAthlete { id })?;

        let start_latlng = lat_lng(id, "start_latlng", summary.start_latlng.as_deref())?;
        let end_latlng = lat_lng(id, "end_latlng", summary.end_latlng.as_deref())?;

        let (map_id, summary_polyline) = match summary.map {
            Some(map) => (map.id, map.summary_polyline.filter(|p| !p.is_empty())),
            None => (None, None),
        };

        Ok(Self {
            id,
            athlete_id,
            name: summary.name,
            sport_type: summary
                .sport_type
                .unwrap_or_else(|| summary.activity_type.clone()),
            activity_type: summary.activity_type,
            distance: summary.distance,
            moving_time: summary.moving_time,
            elapsed_time: summary.elapsed_time,
            total_elevation_gain: summary.total_elevation_gain,
            start_date,
            start_date_local: summary.start_date_local,
            timezone: summary.timezone,
            start_latlng,
            end_latlng,
            achievement_count: summary.achievement_count,
            kudos_count: summary.kudos_count,
            comment_count: summary.comment_count,
            athlete_count: summary.athlete_count,
            photo_count: summary.photo_count,
            map_id,
            summary_polyline,
            trainer: summary.trainer,
            commute: summary.commute,
            manual: summary.manual,
            private: summary.private,
            visibility: summary.visibility,
            flagged: summary.flagged,
            workout_type: summary.workout_type,
            average_speed: summary.average_speed,
            max_speed: summary.max_speed,
            has_heartrate: summary.has_heartrate,
            average_heartrate: summary.average_heartrate,
            max_heartrate: summary.max_heartrate,
            elev_high: summary.elev_high,
            elev_low: summary.elev_low,
            upload_id: summary.upload_id,
            external_id: summary.external_id,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Strava sends `[]` or `null` for activities without GPS.
fn lat_lng(
    id: u64,
    field: &'static str,
    raw: Option<&[f64]>,
) -> Result<Option<LatLng>, MappingError> {
    match raw.unwrap_or_default() {
        [] => Ok(None),
        [lat, lng] if lat.is_finite() && lng.is_finite() => Ok(Some(LatLng {
            lat: *lat,
            lng: *lng,
        })),
        _ => Err(MappingError::LatLng { id, field }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn summary(value: serde_json::Value) -> StravaActivitySummary {
        serde_json::from_value(value).expect("summary should decode")
    }

    #[test]
    fn test_from_summary_maps_fields() {
        let now = Utc::now();
        let activity = Activity::from_summary(
            summary(json!({
                "id": 42,
                "athlete": { "id": 7 },
                "name": "Morning Ride",
                "type": "Ride",
                "sport_type": "GravelRide",
                "distance": 12345.6,
                "moving_time": 3600,
                "elapsed_time": 3900,
                "total_elevation_gain": 321.0,
                "start_date": "2025-06-01T14:00:00Z",
                "start_date_local": "2025-06-01T07:00:00Z",
                "timezone": "(GMT-08:00) America/Los_Angeles",
                "start_latlng": [37.33, -122.17],
                "end_latlng": [],
                "kudos_count": 3,
                "map": { "id": "a42", "summary_polyline": "abc" },
                "average_speed": 3.4,
                "max_speed": 12.0,
                "has_heartrate": true,
                "average_heartrate": 141.2
            })),
            now,
        )
        .unwrap();

        assert_eq!(activity.id, 42);
        assert_eq!(activity.athlete_id, 7);
        assert_eq!(activity.activity_type, "Ride");
        assert_eq!(activity.sport_type, "GravelRide");
        assert_eq!(activity.moving_time, 3600);
        assert_eq!(
            activity.start_latlng,
            Some(LatLng {
                lat: 37.33,
                lng: -122.17
            })
        );
        assert_eq!(activity.end_latlng, None);
        assert_eq!(activity.map_id.as_deref(), Some("a42"));
        assert_eq!(activity.average_heartrate, Some(141.2));
        assert_eq!(activity.created_at, now);
        assert_eq!(activity.updated_at, now);
    }

    #[test]
    fn test_from_summary_rejects_bad_start_date() {
        let err = Activity::from_summary(
            summary(json!({
                "id": 1,
                "athlete": { "id": 7 },
                "start_date": "yesterday"
            })),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, MappingError::StartDate { id: 1, .. }));
    }

    #[test]
    fn test_from_summary_rejects_partial_latlng() {
        let err = Activity::from_summary(
            summary(json!({
                "id": 2,
                "athlete": { "id": 7 },
                "start_date": "2025-06-01T14:00:00Z",
                "start_latlng": [37.33]
            })),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            MappingError::LatLng {
                field: "start_latlng",
                ..
            }
        ));
    }

    #[test]
    fn test_from_summary_null_latlng_is_none() {
        let activity = Activity::from_summary(
            summary(json!({
                "id": 3,
                "athlete": { "id": 7 },
                "type": "VirtualRide",
                "start_date": "2025-06-01T14:00:00Z",
                "start_latlng": null,
                "end_latlng": null,
                "manual": true
            })),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(activity.start_latlng, None);
        assert_eq!(activity.end_latlng, None);
    }
}
