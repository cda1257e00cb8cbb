use serde::Serialize;

use crate::error::WeatherError;

/// One entry of the static region table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Region {
    pub id: &'static str,
    /// Forecast grid coordinates used by the primary provider.
    pub grid_x: u16,
    pub grid_y: u16,
    /// Station id for daily ground observations.
    pub station_id: u16,
    pub localized_name: &'static str,
    /// Query string understood by the global providers.
    pub english_name: &'static str,
}

const fn region(
    id: &'static str,
    grid_x: u16,
    grid_y: u16,
    station_id: u16,
    localized_name: &'static str,
    english_name: &'static str,
) -> Region {
    Region { id, grid_x, grid_y, station_id, localized_name, english_name }
}

const REGIONS: &[Region] = &[
    region("seoul", 60, 127, 108, "서울", "Seoul,KR"),
    region("busan", 98, 76, 159, "부산", "Busan,KR"),
    region("incheon", 55, 124, 112, "인천", "Incheon,KR"),
    region("daegu", 89, 90, 143, "대구", "Daegu,KR"),
    region("daejeon", 67, 100, 133, "대전", "Daejeon,KR"),
    region("gwangju", 58, 74, 156, "광주", "Gwangju,KR"),
    region("ulsan", 102, 84, 152, "울산", "Ulsan,KR"),
    region("sejong", 66, 103, 239, "세종", "Sejong,KR"),
    region("suwon", 60, 121, 119, "수원", "Suwon,KR"),
    region("chuncheon", 73, 134, 101, "춘천", "Chuncheon,KR"),
    region("gangneung", 92, 131, 105, "강릉", "Gangneung,KR"),
    region("cheongju", 69, 106, 131, "청주", "Cheongju,KR"),
    region("jeonju", 63, 89, 146, "전주", "Jeonju,KR"),
    region("pohang", 102, 94, 138, "포항", "Pohang,KR"),
    region("changwon", 90, 77, 155, "창원", "Changwon,KR"),
    region("andong", 91, 106, 136, "안동", "Andong,KR"),
    region("mokpo", 50, 67, 165, "목포", "Mokpo,KR"),
    region("yeosu", 73, 66, 168, "여수", "Yeosu,KR"),
    region("jeju", 52, 38, 184, "제주", "Jeju,KR"),
];

/// Static region lookup. Pure, no I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionDirectory;

impl RegionDirectory {
    pub const CAPITAL: &'static str = "seoul";

    pub fn new() -> Self {
        Self
    }

    /// Resolve by id (case-insensitive) or by localized name.
    pub fn resolve(&self, region_id: &str) -> Result<&'static Region, WeatherError> {
        let wanted = region_id.trim();
        REGIONS
            .iter()
            .find(|r| r.id.eq_ignore_ascii_case(wanted) || r.localized_name == wanted)
            .ok_or_else(|| WeatherError::UnknownRegion(region_id.to_string()))
    }

    /// Capital region, for call sites that must not fail.
    pub fn capital(&self) -> &'static Region {
        &REGIONS[0]
    }

    pub fn regions(&self) -> &'static [Region] {
        REGIONS
    }
}
