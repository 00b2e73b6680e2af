//! Boost release resolution and download
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐  usable   ┌─────────────┐
//! │    Cache    │──────────▶│ Submodules  │ (bootstrapped only)
//! │  (inspect)  │           │  (fan-out)  │
//! └─────────────┘           └─────────────┘
//!        │ absent                  ▲
//!        ▼                         │
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Remote    │────▶│   Matcher   │────▶│   Archive   │
//! │ (ls-remote) │     │ (semver)    │     │ (tar.gz)    │
//! └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`downloader`]: `ensure_downloaded`, wiring everything together
//! - [`cache`]: Lifecycle stage of cached version directories
//! - [`remote`]: Release tag listing via `git ls-remote`
//! - [`range`]: node-semver style version ranges
//! - [`matcher`]: Matching ranges against candidate version strings
//! - [`archive`]: Streaming `.tar.gz` download and extraction
//! - [`submodules`]: Concurrent, failure-tolerant sub-library fetching
//! - [`error`]: Error types
//! - [`semver`]: Version validation helpers

pub mod archive;
pub mod cache;
pub mod downloader;
pub mod error;
pub mod matcher;
pub mod range;
pub mod remote;
pub mod semver;
pub mod submodules;
