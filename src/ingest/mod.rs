// ABOUTME: Ingestion parsers root — one submodule per input shape
// ABOUTME: Each parser is a pure, I/O-free transform into a storage model row
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Ingestion parsers.

pub mod health_parser;
pub mod nutrition_parser;
pub mod workout_importer;

pub use health_parser::{parse_apple_health_xml, parse_health_daily_envelope, parse_health_json_envelope};
pub use nutrition_parser::parse_nutrition_spreadsheet;
pub use workout_importer::import_tracker_workouts;
