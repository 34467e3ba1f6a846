// ABOUTME: Spreadsheet-nutrition parser — xlsx via calamine, csv as a fallback
// ABOUTME: Content-sniffs format before choosing a parsing strategy
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Nutrition spreadsheet ingestion.
//!
//! Accepts either a real `.xlsx` workbook or a delimited `.csv` export.
//! Format is detected by content, not file extension: an `.xlsx` open
//! attempt runs first, and a failure there falls back to treating the
//! bytes as `CSV`.
//!
//! Column headers are matched case-insensitively with spaces/hyphens
//! folded to underscores, so `"Protein (g)"`-style headers and
//! `protein_g` both resolve to the same field.
//!
//! Rows are grouped by date and the macro columns are summed across rows
//! sharing a date, since an export may carry one row per meal rather than
//! one row per day. If the export also carries a recognizable
//! pre-aggregated daily-total column, the summed value is compared
//! against it: fail loudly if they disagree by more than a tolerance,
//! otherwise defer to summation — summation is what gets persisted
//! either way, a mismatch just becomes a `ParseError` instead of a
//! silent discrepancy.

use std::collections::BTreeMap;
use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};
use chrono::NaiveDate;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::NutritionDay;
use crate::storage::normalize::{clean_f64_or_zero, Normalize};

/// Relative tolerance between a summed-from-meals total and a
/// pre-aggregated daily-total column before the disagreement is
/// considered a parse error.
const DAILY_TOTAL_TOLERANCE: f64 = 0.05;

impl Normalize for NutritionDay {
    fn normalized(self) -> Self {
        Self {
            calories: clean_f64_or_zero(self.calories),
            protein_g: clean_f64_or_zero(self.protein_g),
            carbs_g: clean_f64_or_zero(self.carbs_g),
            fats_g: clean_f64_or_zero(self.fats_g),
            fiber_g: clean_f64_or_zero(self.fiber_g),
            ..self
        }
    }
}

fn normalize_header(raw: &str) -> String {
    raw.trim().to_lowercase().replace([' ', '-'], "_")
}

struct ColumnMap {
    headers: Vec<String>,
    date: usize,
    calories: usize,
    protein_g: usize,
    carbs_g: usize,
    fats_g: usize,
    fiber_g: Option<usize>,
    /// A pre-aggregated "this is already the day's total" column, if the
    /// export carries one (e.g. `daily_total_calories`).
    daily_total_calories: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &[String]) -> AppResult<Self> {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
        let find = |candidates: &[&str]| -> Option<usize> {
            candidates
                .iter()
                .find_map(|c| normalized.iter().position(|h| h == c))
        };
        let required = |candidates: &[&str], label: &str| -> AppResult<usize> {
            find(candidates).ok_or_else(|| AppError::parse(format!("missing required column: {label}")))
        };

        Ok(Self {
            headers: headers.to_vec(),
            date: required(&["date", "day"], "date")?,
            calories: required(&["calories", "kcal"], "calories")?,
            protein_g: required(&["protein_g", "protein"], "protein_g")?,
            carbs_g: required(&["carbs_g", "carbohydrates_g", "carbs"], "carbs_g")?,
            fats_g: required(&["fats_g", "fat_g", "fats"], "fats_g")?,
            fiber_g: find(&["fiber_g", "fiber"]),
            daily_total_calories: find(&["daily_total_calories", "day_total_calories", "total_calories"]),
        })
    }
}

fn parse_date_cell(cell: &str) -> AppResult<NaiveDate> {
    for fmt in ["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(cell, fmt) {
            return Ok(date);
        }
    }
    Err(AppError::parse(format!("unrecognized date cell: {cell}")))
}

fn parse_f64_cell(cell: &str) -> f64 {
    cell.trim().parse::<f64>().unwrap_or(f64::NAN)
}

fn row_to_object(cells: &[String], cols: &ColumnMap) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = cols
        .headers
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            let value = cells.get(idx).cloned().unwrap_or_default();
            (header.clone(), serde_json::Value::String(value))
        })
        .collect();
    serde_json::Value::Object(map)
}

/// Parsed date plus macro contribution of one meal-level row.
struct MealRow {
    date: NaiveDate,
    calories: f64,
    protein_g: f64,
    carbs_g: f64,
    fats_g: f64,
    fiber_g: f64,
    daily_total_calories: Option<f64>,
}

fn parse_meal_row(cells: &[String], cols: &ColumnMap) -> AppResult<MealRow> {
    let date = parse_date_cell(cells.get(cols.date).map(String::as_str).unwrap_or_default())?;
    Ok(MealRow {
        date,
        calories: parse_f64_cell(cells.get(cols.calories).map(String::as_str).unwrap_or_default()),
        protein_g: parse_f64_cell(cells.get(cols.protein_g).map(String::as_str).unwrap_or_default()),
        carbs_g: parse_f64_cell(cells.get(cols.carbs_g).map(String::as_str).unwrap_or_default()),
        fats_g: parse_f64_cell(cells.get(cols.fats_g).map(String::as_str).unwrap_or_default()),
        fiber_g: cols
            .fiber_g
            .and_then(|idx| cells.get(idx))
            .map(|c| parse_f64_cell(c))
            .unwrap_or(0.0),
        daily_total_calories: cols
            .daily_total_calories
            .and_then(|idx| cells.get(idx))
            .map(|c| parse_f64_cell(c)),
    })
}

/// Group meal-level rows by date, summing macros per day.
/// `raw` for each day is the list of every source row that contributed to
/// it, every column preserved verbatim.
fn aggregate_by_day(
    user_id: Uuid,
    rows: Vec<Vec<String>>,
    cols: &ColumnMap,
) -> AppResult<Vec<NutritionDay>> {
    let mut by_date: BTreeMap<NaiveDate, (MealRow, Vec<serde_json::Value>)> = BTreeMap::new();

    for cells in &rows {
        let meal = parse_meal_row(cells, cols)?;
        let raw_row = row_to_object(cells, cols);
        let date = meal.date;

        match by_date.get_mut(&date) {
            Some((acc, raws)) => {
                acc.calories += meal.calories;
                acc.protein_g += meal.protein_g;
                acc.carbs_g += meal.carbs_g;
                acc.fats_g += meal.fats_g;
                acc.fiber_g += meal.fiber_g;
                raws.push(raw_row);
            }
            None => {
                by_date.insert(date, (meal, vec![raw_row]));
            }
        }
    }

    by_date
        .into_values()
        .map(|(summed, raw_rows)| {
            if let Some(declared_total) = summed.daily_total_calories {
                let tolerance = (declared_total.abs() * DAILY_TOTAL_TOLERANCE).max(1.0);
                if (summed.calories - declared_total).abs() > tolerance {
                    return Err(AppError::parse(format!(
                        "nutrition export disagreement on {}: summed meal calories {:.1} vs declared daily total {:.1}",
                        summed.date, summed.calories, declared_total
                    )));
                }
            }

            Ok(NutritionDay {
                user_id,
                date: summed.date,
                calories: summed.calories,
                protein_g: summed.protein_g,
                carbs_g: summed.carbs_g,
                fats_g: summed.fats_g,
                fiber_g: summed.fiber_g,
                raw: sqlx::types::Json(serde_json::Value::Array(raw_rows)),
                updated_at: chrono::Utc::now(),
            }
            .normalized())
        })
        .collect()
}

fn try_open_xlsx(bytes: &[u8]) -> Option<Vec<Vec<String>>> {
    let cursor = Cursor::new(bytes);
    let mut workbook: Xlsx<_> = Xlsx::new(cursor).ok()?;
    let sheet_name = workbook.sheet_names().first()?.clone();
    let range = workbook.worksheet_range(&sheet_name).ok()?;

    Some(
        range
            .rows()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect(),
    )
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::DateTime(serial) => serial
            .as_datetime()
            .map(|dt| dt.date().to_string())
            .unwrap_or_default(),
        other => other.to_string(),
    }
}

fn parse_csv(bytes: &[u8]) -> AppResult<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(false).from_reader(bytes);
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| AppError::parse(format!("csv parse error: {e}")))?;
        rows.push(record.iter().map(str::to_owned).collect());
    }
    Ok(rows)
}

/// Parse a nutrition spreadsheet export into normalized [`NutritionDay`]
/// rows, one per distinct date after summing any meal-level rows sharing
/// that date.
///
/// # Errors
///
/// Returns `ParseError` if neither the `xlsx` nor `csv` reader can make
/// sense of `bytes`, if a required column is missing, or if a declared
/// daily-total column disagrees with the summed meal rows by more than
/// the tolerance.
pub fn parse_nutrition_spreadsheet(
    user_id: Uuid,
    bytes: &[u8],
) -> AppResult<impl Iterator<Item = AppResult<NutritionDay>>> {
    let mut rows = try_open_xlsx(bytes).map_or_else(|| parse_csv(bytes), Ok)?;
    if rows.is_empty() {
        return Err(AppError::parse("spreadsheet contained no rows"));
    }
    let headers = rows.remove(0);
    let cols = ColumnMap::from_headers(&headers)?;

    Ok(aggregate_by_day(user_id, rows, &cols)?.into_iter().map(Ok))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_with_recognized_headers_parses() {
        let csv = "date,calories,protein_g,carbs_g,fats_g,fiber_g\n2026-01-01,2200,180,220,70,30\n";
        let user_id = Uuid::new_v4();
        let rows: Vec<_> = parse_nutrition_spreadsheet(user_id, csv.as_bytes())
            .expect("parse should succeed")
            .collect::<Result<_, _>>()
            .expect("all rows should parse");
        assert_eq!(rows.len(), 1);
        let day: &NutritionDay = &rows[0];
        assert_eq!(day.calories, 2200.0);
        assert_eq!(day.fiber_g, 30.0);
    }

    #[test]
    fn missing_required_column_is_a_parse_error() {
        let csv = "date,calories\n2026-01-01,2200\n";
        let err = parse_nutrition_spreadsheet(Uuid::new_v4(), csv.as_bytes()).unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorCode::ParseError);
    }

    #[test]
    fn meal_level_rows_on_the_same_date_are_summed() {
        let csv = "date,calories,protein_g,carbs_g,fats_g,fiber_g\n\
                    2026-01-01,500,40,50,15,5\n\
                    2026-01-01,700,60,70,25,8\n\
                    2026-01-02,2000,150,200,60,25\n";
        let rows: Vec<_> = parse_nutrition_spreadsheet(Uuid::new_v4(), csv.as_bytes())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows.len(), 2);
        let day_one: &NutritionDay = &rows[0];
        assert_eq!(day_one.calories, 1200.0);
        assert_eq!(day_one.protein_g, 100.0);
        assert_eq!(day_one.raw.0.as_array().unwrap().len(), 2);
    }

    #[test]
    fn daily_total_disagreement_beyond_tolerance_is_a_parse_error() {
        let csv = "date,calories,protein_g,carbs_g,fats_g,daily_total_calories\n\
                    2026-01-01,500,40,50,15,500\n\
                    2026-01-01,700,60,70,25,5000\n";
        let err = parse_nutrition_spreadsheet(Uuid::new_v4(), csv.as_bytes()).unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorCode::ParseError);
    }

    #[test]
    fn fiber_defaults_to_zero_when_column_absent() {
        let csv = "date,calories,protein_g,carbs_g,fats_g\n2026-01-01,2000,150,200,60\n";
        let rows: Vec<_> = parse_nutrition_spreadsheet(Uuid::new_v4(), csv.as_bytes())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows[0].fiber_g, 0.0);
    }
}
