// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image moderation core: decoding, face detection, NSFW scoring and the
//! verdict that merges them

pub mod errors;
pub mod pipeline;
pub mod verdict;

pub use errors::ModerationError;
pub use pipeline::ModerationPipeline;
pub use verdict::{FaceSummary, Verdict, VerdictComposer, DEFAULT_UNSAFE_THRESHOLD, UNSAFE_REASON};
