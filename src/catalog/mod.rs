//! Target discovery
//!
//! [`scanner`] tags each logical line of a makefile; [`builder`] turns the
//! tagged lines into an ordered [`Catalog`] of [`TargetRecord`]s.

pub mod builder;
pub mod scanner;

pub use builder::{build, BuildOptions, Catalog, TargetFilter, TargetRecord};
pub use scanner::{classify, scan, Definition, LineKind, ScannedLine};
