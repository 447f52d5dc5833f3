//! Standard enrichment steps

use contracts::{Column, HumidityLevel, Table};

use crate::error::StepError;
use crate::step::TransformStep;

const ABSOLUTE_ZERO_OFFSET: f64 = 273.15;
const RAIN_WORDS: [&str; 6] = ["rain", "drizzle", "storm", "shower", "downpour", "sprinkle"];
const MISSING_TEXT: &str = "NA";

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn kelvin_to_celsius(kelvin: f64) -> f64 {
    round2(kelvin - ABSOLUTE_ZERO_OFFSET)
}

fn mentions_rain(description: &str) -> bool {
    let lower = description.to_lowercase();
    RAIN_WORDS.iter().any(|word| lower.contains(word))
}

/// `temp_celsius = round2(temp_k - 273.15)`
#[derive(Debug, Clone, Copy, Default)]
pub struct KelvinToCelsius;

impl TransformStep for KelvinToCelsius {
    fn name(&self) -> &str {
        "kelvin_to_celsius"
    }

    fn required_columns(&self) -> &[Column] {
        &[Column::TempK]
    }

    fn transform(&self, mut table: Table) -> Result<Table, StepError> {
        for row in table.rows_mut() {
            row.temp_celsius = row.temp_k.map(kelvin_to_celsius);
        }
        table.add_column(Column::TempCelsius);
        Ok(table)
    }
}

/// Apparent temperature in Celsius
///
/// Provider value when present, otherwise a simplified heat index (hot and
/// humid) or wind chill (cold and windy), otherwise the air temperature.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddFeelsLikeTemp;

impl AddFeelsLikeTemp {
    fn compute(
        feels_like_k: Option<f64>,
        temp_c: Option<f64>,
        humidity: Option<f64>,
        wind: Option<f64>,
    ) -> Option<f64> {
        if let Some(feels_like_k) = feels_like_k {
            return Some(kelvin_to_celsius(feels_like_k));
        }
        let (t, h, w) = (temp_c?, humidity?, wind?);
        let value = if t >= 27.0 && h >= 40.0 {
            0.5 * t + 0.5 * h - 10.0
        } else if t <= 10.0 && w > 1.3 {
            t - 0.7 * w
        } else {
            t
        };
        Some(round2(value))
    }
}

impl TransformStep for AddFeelsLikeTemp {
    fn name(&self) -> &str {
        "add_feels_like_temp"
    }

    fn required_columns(&self) -> &[Column] {
        &[Column::TempCelsius]
    }

    fn transform(&self, mut table: Table) -> Result<Table, StepError> {
        for row in table.rows_mut() {
            row.feels_like_temp =
                Self::compute(row.feels_like_k, row.temp_celsius, row.humidity, row.wind_speed);
        }
        table.add_column(Column::FeelsLikeTemp);
        Ok(table)
    }
}

/// `low` (<40), `moderate` (40..=70), `high` (>70)
#[derive(Debug, Clone, Copy, Default)]
pub struct AddHumidityLevel;

impl TransformStep for AddHumidityLevel {
    fn name(&self) -> &str {
        "add_humidity_level"
    }

    fn required_columns(&self) -> &[Column] {
        &[Column::Humidity]
    }

    fn transform(&self, mut table: Table) -> Result<Table, StepError> {
        for row in table.rows_mut() {
            row.humidity_level = row.humidity.map(HumidityLevel::from_humidity);
        }
        table.add_column(Column::HumidityLevel);
        Ok(table)
    }
}

/// Outdoor-event suitability, 0..=10
#[derive(Debug, Clone, Copy, Default)]
pub struct AddWeatherScore;

impl AddWeatherScore {
    fn score(
        temp_c: Option<f64>,
        humidity: Option<f64>,
        wind: Option<f64>,
        description: Option<&str>,
    ) -> u8 {
        let temp = temp_c.unwrap_or(20.0);
        let humidity = humidity.unwrap_or(50.0);
        let wind = wind.unwrap_or(2.0);

        let mut score: i32 = 10;
        if description.is_some_and(mentions_rain) {
            score -= 4;
        }
        if humidity > 80.0 {
            score -= 2;
        } else if humidity < 30.0 {
            score -= 1;
        }
        if wind > 8.0 {
            score -= 2;
        }
        if !(10.0..=32.0).contains(&temp) {
            score -= 2;
        }
        score.clamp(0, 10) as u8
    }
}

impl TransformStep for AddWeatherScore {
    fn name(&self) -> &str {
        "add_weather_score"
    }

    fn required_columns(&self) -> &[Column] {
        &[
            Column::TempCelsius,
            Column::Humidity,
            Column::WindSpeed,
            Column::Description,
        ]
    }

    fn transform(&self, mut table: Table) -> Result<Table, StepError> {
        for row in table.rows_mut() {
            row.weather_score = Some(Self::score(
                row.temp_celsius,
                row.humidity,
                row.wind_speed,
                row.description.as_deref(),
            ));
        }
        table.add_column(Column::WeatherScore);
        Ok(table)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AddIsRainy;

impl TransformStep for AddIsRainy {
    fn name(&self) -> &str {
        "add_is_rainy"
    }

    fn required_columns(&self) -> &[Column] {
        &[Column::Description]
    }

    fn transform(&self, mut table: Table) -> Result<Table, StepError> {
        for row in table.rows_mut() {
            row.is_rainy = Some(row.description.as_deref().is_some_and(mentions_rain));
        }
        table.add_column(Column::IsRainy);
        Ok(table)
    }
}

/// Absent → `NA`; otherwise first letter upper-case, the rest lower-case
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanDescription;

impl CleanDescription {
    fn capitalize(text: &str) -> String {
        let mut chars = text.chars();
        match chars.next() {
            Some(first) => first
                .to_uppercase()
                .chain(chars.flat_map(char::to_lowercase))
                .collect(),
            None => String::new(),
        }
    }
}

impl TransformStep for CleanDescription {
    fn name(&self) -> &str {
        "clean_description"
    }

    fn required_columns(&self) -> &[Column] {
        &[Column::Description]
    }

    fn transform(&self, mut table: Table) -> Result<Table, StepError> {
        for row in table.rows_mut() {
            row.description = Some(match row.description.as_deref() {
                Some(text) => Self::capitalize(text),
                None => MISSING_TEXT.to_string(),
            });
        }
        Ok(table)
    }
}

/// Text placeholders for absent descriptions and sources; numbers stay absent
#[derive(Debug, Clone, Copy, Default)]
pub struct FillMissing;

impl TransformStep for FillMissing {
    fn name(&self) -> &str {
        "fill_missing"
    }

    fn transform(&self, mut table: Table) -> Result<Table, StepError> {
        let fill_description = table.has_column(Column::Description);
        let fill_source = table.has_column(Column::Source);
        for row in table.rows_mut() {
            if fill_description && row.description.is_none() {
                row.description = Some(MISSING_TEXT.to_string());
            }
            if fill_source && row.source.is_none() {
                row.source = Some(MISSING_TEXT.to_string());
            }
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::MergedRow;

    fn weather_table(rows: Vec<MergedRow>) -> Table {
        let mut table = Table::with_columns(Column::WEATHER);
        for row in rows {
            table.push(row);
        }
        table
    }

    fn row(temp_k: f64, humidity: f64, wind: f64, description: &str) -> MergedRow {
        MergedRow {
            location: "A".into(),
            temp_k: Some(temp_k),
            humidity: Some(humidity),
            wind_speed: Some(wind),
            description: Some(description.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_kelvin_to_celsius() {
        let table = weather_table(vec![row(300.0, 50.0, 1.0, "clear sky")]);
        let table = KelvinToCelsius.apply(table).unwrap();
        assert!(table.has_column(Column::TempCelsius));
        assert_eq!(table.rows()[0].temp_celsius, Some(26.85));
    }

    #[test]
    fn test_kelvin_to_celsius_requires_temp_k() {
        let err = KelvinToCelsius.apply(Table::empty()).unwrap_err();
        assert_eq!(
            err,
            StepError::MissingColumn {
                step: "kelvin_to_celsius".into(),
                column: Column::TempK,
            }
        );
    }

    #[test]
    fn test_feels_like_prefers_provider_value() {
        assert_eq!(
            AddFeelsLikeTemp::compute(Some(303.15), Some(1.0), Some(1.0), Some(1.0)),
            Some(30.0)
        );
    }

    #[test]
    fn test_feels_like_formulas() {
        // heat index
        assert_eq!(
            AddFeelsLikeTemp::compute(None, Some(30.0), Some(60.0), Some(1.0)),
            Some(35.0)
        );
        // wind chill
        assert_eq!(
            AddFeelsLikeTemp::compute(None, Some(5.0), Some(60.0), Some(4.0)),
            Some(2.2)
        );
        // neither
        assert_eq!(
            AddFeelsLikeTemp::compute(None, Some(18.5), Some(60.0), Some(4.0)),
            Some(18.5)
        );
        assert_eq!(AddFeelsLikeTemp::compute(None, Some(18.5), None, Some(4.0)), None);
    }

    #[test]
    fn test_humidity_bands() {
        let table = weather_table(vec![
            row(290.0, 39.9, 1.0, "x"),
            row(290.0, 40.0, 1.0, "x"),
            row(290.0, 50.0, 1.0, "x"),
            row(290.0, 70.0, 1.0, "x"),
            row(290.0, 70.1, 1.0, "x"),
        ]);
        let table = AddHumidityLevel.apply(table).unwrap();
        let levels: Vec<Option<HumidityLevel>> =
            table.rows().iter().map(|r| r.humidity_level).collect();
        assert_eq!(
            levels,
            [
                Some(HumidityLevel::Low),
                Some(HumidityLevel::Moderate),
                Some(HumidityLevel::Moderate),
                Some(HumidityLevel::Moderate),
                Some(HumidityLevel::High),
            ]
        );
        assert_eq!(table.rows()[2].cell(Column::HumidityLevel).as_deref(), Some("moderate"));
    }

    #[test]
    fn test_weather_score() {
        assert_eq!(AddWeatherScore::score(Some(22.0), Some(50.0), Some(2.0), Some("clear sky")), 10);
        assert_eq!(AddWeatherScore::score(Some(22.0), Some(85.0), Some(9.0), Some("Heavy Rain")), 2);
        assert_eq!(AddWeatherScore::score(Some(35.0), Some(20.0), Some(2.0), None), 7);
        assert_eq!(AddWeatherScore::score(None, None, None, None), 10);
        assert_eq!(
            AddWeatherScore::score(Some(-5.0), Some(95.0), Some(20.0), Some("thunderstorm")),
            0
        );
    }

    #[test]
    fn test_weather_score_requires_celsius() {
        let table = weather_table(vec![row(290.0, 50.0, 1.0, "x")]);
        let err = AddWeatherScore.apply(table).unwrap_err();
        assert!(matches!(
            err,
            StepError::MissingColumn {
                column: Column::TempCelsius,
                ..
            }
        ));
    }

    #[test]
    fn test_is_rainy() {
        let mut absent = row(290.0, 50.0, 1.0, "");
        absent.description = None;
        let table = weather_table(vec![
            row(290.0, 50.0, 1.0, "Light Drizzle"),
            row(290.0, 50.0, 1.0, "clear sky"),
            absent,
        ]);
        let table = AddIsRainy.apply(table).unwrap();
        let flags: Vec<Option<bool>> = table.rows().iter().map(|r| r.is_rainy).collect();
        assert_eq!(flags, [Some(true), Some(false), Some(false)]);
    }

    #[test]
    fn test_clean_description() {
        let mut absent = row(290.0, 50.0, 1.0, "");
        absent.description = None;
        let table = weather_table(vec![row(290.0, 50.0, 1.0, "oVERcast CLOUDS"), absent]);
        let table = CleanDescription.apply(table).unwrap();
        assert_eq!(table.rows()[0].description.as_deref(), Some("Overcast clouds"));
        assert_eq!(table.rows()[1].description.as_deref(), Some("NA"));
    }

    #[test]
    fn test_fill_missing_keeps_numbers_absent() {
        let mut sparse = MergedRow::new("A");
        sparse.temp_k = None;
        let table = FillMissing.apply(weather_table(vec![sparse])).unwrap();
        let filled = &table.rows()[0];
        assert_eq!(filled.description.as_deref(), Some("NA"));
        assert_eq!(filled.source.as_deref(), Some("NA"));
        assert_eq!(filled.temp_k, None);
        assert_eq!(filled.timestamp, None);
    }
}
