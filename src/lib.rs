// SPDX-License-Identifier: MPL-2.0

//! Unified newest-first feed over the 탑골톡 community collections.

pub mod backend;
pub mod cache;
pub mod config;
pub mod feed;
pub mod model;
pub mod runtime;
pub mod state;
