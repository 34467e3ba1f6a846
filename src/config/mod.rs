// ABOUTME: Configuration module root — environment parsing and logging setup
// ABOUTME: Configuration layout trimmed to this system's surface
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

pub mod environment;
pub mod logging;

pub use environment::ServerConfig;
