//! Season labels and the phrase/colour tables shown next to a record.
//!
//! Threshold tables are evaluated top to bottom and the first match wins.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    /// Match on the Korean season word contained in a label such as "초가을".
    pub fn from_label(label: &str) -> Option<Self> {
        if label.contains('봄') {
            Some(Season::Spring)
        } else if label.contains("여름") {
            Some(Season::Summer)
        } else if label.contains("가을") {
            Some(Season::Autumn)
        } else if label.contains("겨울") {
            Some(Season::Winter)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Early,
    Mid,
    Late,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonInfo {
    pub season: Season,
    pub period: Period,
    pub label: &'static str,
    pub emoji: &'static str,
}

/// Month-based calendar mapping.
pub fn season_for_date(date: NaiveDate) -> SeasonInfo {
    let (season, period, label, emoji) = match date.month() {
        3 => (Season::Spring, Period::Early, "초봄", "🌱"),
        4 | 5 => (Season::Spring, Period::Late, "늦봄", "🌸"),
        6 => (Season::Summer, Period::Early, "초여름", "🌿"),
        7 => (Season::Summer, Period::Mid, "한여름", "☀️"),
        8 => (Season::Summer, Period::Late, "늦여름", "🌻"),
        9 | 10 => (Season::Autumn, Period::Early, "초가을", "🍁"),
        11 => (Season::Autumn, Period::Late, "늦가을", "🍂"),
        12 => (Season::Winter, Period::Early, "초겨울", "⛄"),
        1 => (Season::Winter, Period::Mid, "한겨울", "❄️"),
        _ => (Season::Winter, Period::Late, "늦겨울", "🌨️"),
    };
    SeasonInfo { season, period, label, emoji }
}

/// Phrase describing how `temperature` feels in the given season label.
///
/// Labels without a recognisable season use the autumn table.
pub fn weather_expression(season_label: &str, temperature: f64) -> &'static str {
    let t = temperature;
    match Season::from_label(season_label).unwrap_or(Season::Autumn) {
        Season::Spring => {
            if t >= 20.0 {
                "따뜻해요"
            } else if t >= 15.0 {
                "포근해요"
            } else if t >= 10.0 {
                "시원해요"
            } else {
                "쌀쌀해요"
            }
        }
        Season::Summer => {
            if t >= 35.0 {
                "너무 더워요"
            } else if t >= 30.0 {
                "무척 더워요"
            } else if t >= 27.0 {
                "더워요"
            } else if t >= 23.0 {
                "딱 좋아요"
            } else {
                "선선해요"
            }
        }
        Season::Autumn => {
            if t >= 20.0 {
                "따뜻해요"
            } else if t >= 15.0 {
                "선선해요"
            } else if t >= 10.0 {
                "시원해요"
            } else {
                "쌀쌀해요"
            }
        }
        Season::Winter => {
            if t >= 5.0 {
                "쌀쌀해요"
            } else if t >= 0.0 {
                "추워요"
            } else if t >= -3.0 {
                "매우 추워요"
            } else {
                "꽁꽁 얼겠어요"
            }
        }
    }
}

const DEFAULT_EXPRESSION_COLOR: &str = "#03A9F4";

pub fn expression_color(expression: &str) -> &'static str {
    if expression.contains("더워요") {
        "#F44336"
    } else if expression.contains("따뜻해요") || expression.contains("포근해요") {
        "#FF9800"
    } else if expression.contains("시원해요") || expression.contains("선선해요") {
        "#03A9F4"
    } else if expression.contains("추워요") || expression.contains("얼겠어요") {
        "#81D4FA"
    } else {
        DEFAULT_EXPRESSION_COLOR
    }
}

pub fn season_color(season_label: &str) -> &'static str {
    match Season::from_label(season_label) {
        Some(Season::Spring) => "#8BC34A",
        Some(Season::Summer) => "#2196F3",
        Some(Season::Autumn) | None => "#795548",
        Some(Season::Winter) => "#1A237E",
    }
}
