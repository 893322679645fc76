//! Run report output.
//!
//! ```text
//! report_dir/
//! └── 2025-05-06/
//!     ├── ingest-071502.json
//!     └── ingest-190044.json
//! ```

pub mod json;
