//! 合并：天气通道为主表，左连接空气质量，追加历史记录，稳定排序

use std::collections::HashMap;

use chrono::NaiveDate;
use contracts::{Column, MeasurementRecord, MergedRow, Table};
use tracing::debug;

use crate::classify::Lanes;

/// 把一条天气形态的记录转换成行（空气质量记录只带地点、时间与来源）
pub fn row_from_record(record: &MeasurementRecord) -> MergedRow {
    let mut row = MergedRow::new(record.location.clone());
    row.timestamp = record.timestamp;
    row.source = Some(record.source.provenance().to_string());

    if let Some(weather) = record.weather() {
        row.temp_k = weather.temp_k;
        row.feels_like_k = weather.feels_like_k;
        row.humidity = weather.humidity;
        row.wind_speed = weather.wind_speed;
        row.description = weather.description.clone();
    }
    row
}

/// 合并各通道与历史表
///
/// 1. 天气通道建主表
/// 2. A 路非空时按地点左连接 `aqi`
/// 3. B 路与主表都非空时按 (地点, 日期) 左连接 `aqi_open_meteo`
/// 4. 直接追加历史行
/// 5. 按 (地点, 时间) 升序稳定排序
///
/// 左连接不会增减主表行：重复的空气质量键取第一条，缺失日期不参与匹配。
pub fn merge(lanes: Lanes, historical: Table) -> Table {
    let mut table = if lanes.weather.is_empty() {
        Table::empty()
    } else {
        Table::with_columns(Column::WEATHER)
    };
    for record in &lanes.weather {
        table.push(row_from_record(record));
    }

    if !lanes.air_quality_a.is_empty() {
        join_by_location(&mut table, &lanes.air_quality_a);
    }

    if !lanes.air_quality_b.is_empty() && !lanes.weather.is_empty() {
        join_by_location_and_date(&mut table, &lanes.air_quality_b);
    }

    if !lanes.historical.is_empty() {
        let mut rows = Table::with_columns(Column::WEATHER);
        for record in &lanes.historical {
            rows.push(row_from_record(record));
        }
        table.append(rows);
    }

    if !historical.is_empty() {
        debug!(rows = historical.len(), "appending historical rows");
        table.append(historical);
    }

    table.sort_by_location_and_time();
    table
}

fn join_by_location(table: &mut Table, lane: &[MeasurementRecord]) {
    let mut index: HashMap<&str, Option<f64>> = HashMap::with_capacity(lane.len());
    for record in lane {
        index
            .entry(record.location.as_str())
            .or_insert(record.air_quality_index());
    }

    table.add_column(Column::Aqi);
    let mut matched = 0usize;
    for row in table.rows_mut() {
        if let Some(value) = index.get(row.location.as_str()) {
            matched += 1;
            row.aqi = *value;
        }
    }
    debug!(matched, lane = lane.len(), "joined air-quality A by location");
}

fn join_by_location_and_date(table: &mut Table, lane: &[MeasurementRecord]) {
    let mut index: HashMap<(&str, NaiveDate), Option<f64>> = HashMap::with_capacity(lane.len());
    for record in lane {
        let Some(timestamp) = record.timestamp else {
            continue;
        };
        index
            .entry((record.location.as_str(), timestamp.date_naive()))
            .or_insert(record.air_quality_index());
    }

    table.add_column(Column::AqiOpenMeteo);
    let mut matched = 0usize;
    for row in table.rows_mut() {
        let Some(date) = row.date() else {
            continue;
        };
        if let Some(value) = index.get(&(row.location.as_str(), date)) {
            matched += 1;
            row.aqi_open_meteo = *value;
        }
    }
    debug!(matched, lane = lane.len(), "joined air-quality B by location and date");
}
