// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod moderation;
pub mod monitoring;
pub mod version;
pub mod vision;

pub use config::ModerationConfig;
pub use moderation::{ModerationError, ModerationPipeline, Verdict, VerdictComposer};
pub use vision::ModerationModels;
