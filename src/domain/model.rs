use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// 回合顯示用的作品資訊快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", into = "ArtworkDetailsWire")]
pub struct ArtworkDetails {
    pub object_id: u64,
    pub image_url: String,
    pub title: String,
    pub artist: String,
    pub year: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
}

/// 輸出格式多一個 locationDescription，內容與 country 相同
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ArtworkDetailsWire {
    object_id: u64,
    image_url: String,
    title: String,
    artist: String,
    year: String,
    location_description: String,
    country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    medium: Option<String>,
}

impl From<ArtworkDetails> for ArtworkDetailsWire {
    fn from(details: ArtworkDetails) -> Self {
        Self {
            object_id: details.object_id,
            image_url: details.image_url,
            title: details.title,
            artist: details.artist,
            year: details.year,
            location_description: details.country.clone(),
            country: details.country,
            medium: details.medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtworkCandidate {
    #[serde(flatten)]
    pub details: ArtworkDetails,
    pub target: Coordinate,
}

impl ArtworkCandidate {
    pub fn object_id(&self) -> u64 {
        self.details.object_id
    }
}

/// 博物館 API `/objects/{id}` 的回應
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MuseumObject {
    #[serde(rename = "objectID")]
    pub object_id: u64,
    pub is_public_domain: bool,
    #[serde(deserialize_with = "nullable_string")]
    pub primary_image: String,
    #[serde(deserialize_with = "nullable_string")]
    pub primary_image_small: String,
    #[serde(deserialize_with = "nullable_string")]
    pub title: String,
    #[serde(deserialize_with = "nullable_string")]
    pub artist_display_name: String,
    #[serde(deserialize_with = "nullable_string")]
    pub object_date: String,
    #[serde(deserialize_with = "nullable_string")]
    pub country: String,
    #[serde(deserialize_with = "nullable_string")]
    pub medium: String,
}

fn nullable_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(rename = "objectIDs")]
    pub object_ids: Option<Vec<u64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub q: String,
    pub geo_location: Option<String>,
    pub paintings_only: bool,
}

impl SearchQuery {
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            geo_location: None,
            paintings_only: false,
        }
    }

    pub fn with_geo_location(mut self, country: impl Into<String>) -> Self {
        self.geo_location = Some(country.into());
        self
    }

    pub fn paintings(mut self, paintings_only: bool) -> Self {
        self.paintings_only = paintings_only;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RoundSessionEntry {
    pub target: Coordinate,
    pub details: ArtworkDetails,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResult {
    pub score: u32,
    pub distance_km: u64,
    pub target: Coordinate,
    pub object: ArtworkDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnappedGuess {
    pub lat: f64,
    pub lng: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub snapped: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_serializes_flat() {
        let candidate = ArtworkCandidate {
            details: ArtworkDetails {
                object_id: 42,
                image_url: "https://images.example.org/42.jpg".to_string(),
                title: "Bowl".to_string(),
                artist: "Unknown Artist".to_string(),
                year: "ca. 1200".to_string(),
                country: "Iran".to_string(),
                medium: None,
            },
            target: Coordinate::new(32.4, 53.7),
        };

        let json = serde_json::to_value(&candidate).unwrap();
        assert_eq!(json["objectId"], 42);
        assert_eq!(json["imageUrl"], "https://images.example.org/42.jpg");
        assert_eq!(json["target"]["lat"], 32.4);
        assert!(json.get("medium").is_none());
        assert!(json.get("details").is_none());
        assert_eq!(json["locationDescription"], "Iran");
        assert_eq!(json["country"], "Iran");

        // 讀回時忽略 locationDescription
        let parsed: ArtworkCandidate = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, candidate);
    }

    #[test]
    fn test_museum_object_tolerates_missing_fields() {
        let object: MuseumObject =
            serde_json::from_str(r#"{"objectID": 7, "isPublicDomain": true, "country": null}"#)
                .unwrap();
        assert_eq!(object.country, "");
        assert_eq!(object.primary_image, "");

        let object: MuseumObject = serde_json::from_str(
            r#"{"objectID": 7, "isPublicDomain": true, "primaryImageSmall": "s.jpg", "title": "Vase"}"#,
        )
        .unwrap();
        assert_eq!(object.object_id, 7);
        assert!(object.is_public_domain);
        assert_eq!(object.primary_image_small, "s.jpg");
        assert_eq!(object.country, "");
    }

    #[test]
    fn test_coordinate_range() {
        assert!(Coordinate::new(48.8, 2.3).is_valid());
        assert!(!Coordinate::new(91.0, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, -180.5).is_valid());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_valid());
    }
}
