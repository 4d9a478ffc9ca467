// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod errors;
pub mod retry_policy;
pub mod telemetry;
pub mod text_encoding;
pub mod url_normalizer;
