//! Output generation for reports.
//!
//! - [`json`]: writes dedupe reports as JSON for downstream consumers
//!
//! # Output Structure
//!
//! ```text
//! json_output_dir/
//! └── 2025-05-06/
//!     ├── dedupe_08-00-00.json
//!     └── dedupe_16-00-00.json
//! ```

pub mod json;
