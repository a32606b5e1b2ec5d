//! listinsight - cross-source intelligence for DNS blocklist feeds
//!
//! The analysis stage of a blocklist pipeline: given validated, normalized
//! source files it reports how sources overlap (including allowlist versus
//! blocklist conflicts) and which entries the most independent sources agree
//! on.

pub mod cli;
pub mod config;
pub mod error;
pub mod intern;
pub mod model;
pub mod output;
pub mod overlap;
pub mod pool;
pub mod top;

pub use error::{AnalyzerError, Result};
pub use intern::InternCache;
pub use model::{ListType, ProcessedFile};
pub use overlap::{OverlapEngine, OverlapOptions};
pub use pool::WorkerPool;
pub use top::{TopAggregator, TopOptions};
