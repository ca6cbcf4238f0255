//! Pipeline stages for document intake.
//!
//! Each submodule implements exactly one step, so each can be tested without
//! the others.
//!
//! ## Data Flow
//!
//! ```text
//! SubmittedFile ──▶ classify ──▶ route ──▶ report
//!                   │  ├ encode   (decode, PDF)
//!                   │  └ evaluate (quality gate, using metrics)
//!                   └ naming      (stored names, folder names)
//! ```
//!
//! 1. [`metrics`]  : sharpness, contrast and brightness of a luma raster
//! 2. [`evaluate`] : ordered threshold checks with early exit
//! 3. [`naming`]   : sanitised file names, client slugs, numbered duplicates
//! 4. [`encode`]   : image decoding and single-page PDF output
//! 5. [`classify`] : image or passthrough, accepted or rejected, staged to
//!    disk; runs in `spawn_blocking` because decoding is CPU-bound
//! 6. [`route`]    : folder plan, find-before-create, skip-on-existing uploads
//! 7. [`report`]   : the plain-text summary stored with the files

pub mod classify;
pub mod encode;
pub mod evaluate;
pub mod metrics;
pub mod naming;
pub mod report;
pub mod route;
