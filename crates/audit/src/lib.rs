//! `larder-audit`: catalog and recipe audit engine.
//!
//! Pure engine crate: receives pre-loaded item and recipe records, returns
//! flags, duplicate clusters, resolved and costed recipe lines, and cost
//! outlier verdicts. No filesystem access; `load` parses CSV text only.

pub mod config;
pub mod consistency;
pub mod cost;
pub mod duplicates;
pub mod engine;
pub mod error;
pub mod load;
pub mod model;
pub mod outliers;
pub mod parse;
pub mod resolve;
pub mod similarity;
pub mod summary;
pub mod units;
pub mod validate;

pub use config::AuditConfig;
pub use engine::run;
pub use error::{AuditError, UomError};
pub use load::{load_items_csv, load_recipes_csv, CsvTable};
pub use model::{AuditInput, AuditResult, ItemRecord, RecipeRecord};
pub use units::UomRegistry;
