// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod memory_dedup_cache;
pub mod redis_client;
pub mod redis_dedup_cache;
