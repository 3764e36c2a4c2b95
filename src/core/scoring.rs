use crate::domain::model::Coordinate;

pub const EARTH_RADIUS_KM: f64 = 6371.0;
pub const MAX_SCORE: u32 = 5000;
pub const MAX_SCORING_DISTANCE_KM: f64 = 10_000.0;

/// Haversine 大圓距離 (公里)
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    // 浮點誤差可能讓 h 略大於 1
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// 線性衰減：0 km 得 5000 分，10,000 km 以上得 0 分
pub fn score_from_distance(distance_km: f64) -> u32 {
    if distance_km.is_nan() || distance_km >= MAX_SCORING_DISTANCE_KM {
        return 0;
    }
    let remaining = 1.0 - distance_km.max(0.0) / MAX_SCORING_DISTANCE_KM;
    (MAX_SCORE as f64 * remaining).round() as u32
}
