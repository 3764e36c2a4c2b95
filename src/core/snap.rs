use crate::core::centroids::get_centroid;
use crate::domain::model::{Coordinate, SnappedGuess};
use crate::domain::ports::Geocoder;

/// 將地圖點擊對齊到該國代表座標；任何失敗都退回原始點擊位置
pub async fn snap_guess(geocoder: Option<&dyn Geocoder>, click: Coordinate) -> SnappedGuess {
    let raw = SnappedGuess {
        lat: click.lat,
        lng: click.lng,
        country: None,
        snapped: false,
    };

    let Some(geocoder) = geocoder else {
        return raw;
    };

    let country = match geocoder.reverse(click).await {
        Ok(Some(country)) => country,
        Ok(None) => return raw,
        Err(e) => {
            tracing::warn!("Reverse geocoding failed, using raw click: {}", e);
            return raw;
        }
    };

    match get_centroid(&country) {
        Some(centroid) => {
            tracing::debug!("Snapped click to {} centroid", country);
            SnappedGuess {
                lat: centroid.lat,
                lng: centroid.lng,
                country: Some(country),
                snapped: true,
            }
        }
        None => SnappedGuess {
            country: Some(country),
            ..raw
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::{GameError, Result};
    use async_trait::async_trait;

    struct FixedGeocoder(Option<&'static str>);

    #[async_trait]
    impl Geocoder for FixedGeocoder {
        async fn reverse(&self, _point: Coordinate) -> Result<Option<String>> {
            Ok(self.0.map(str::to_string))
        }
    }

    struct BrokenGeocoder;

    #[async_trait]
    impl Geocoder for BrokenGeocoder {
        async fn reverse(&self, _point: Coordinate) -> Result<Option<String>> {
            Err(GameError::UpstreamTimeout {
                url: "http://geocoder/reverse".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_click_snaps_to_country_centroid() {
        let click = Coordinate::new(43.3, 5.4);
        let snapped = snap_guess(Some(&FixedGeocoder(Some("France"))), click).await;

        let france = get_centroid("France").unwrap();
        assert!(snapped.snapped);
        assert_eq!(snapped.country.as_deref(), Some("France"));
        assert_eq!((snapped.lat, snapped.lng), (france.lat, france.lng));
    }

    #[tokio::test]
    async fn test_failures_fall_back_to_raw_click() {
        let click = Coordinate::new(-12.5, 101.25);

        for snapped in [
            snap_guess(Some(&BrokenGeocoder), click).await,
            snap_guess(Some(&FixedGeocoder(None)), click).await,
            snap_guess(None, click).await,
        ] {
            assert!(!snapped.snapped);
            assert_eq!((snapped.lat, snapped.lng), (click.lat, click.lng));
        }

        let unknown = snap_guess(Some(&FixedGeocoder(Some("Atlantis"))), click).await;
        assert!(!unknown.snapped);
        assert_eq!(unknown.country.as_deref(), Some("Atlantis"));
    }
}
