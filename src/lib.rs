//! # Dexcount
//!
//! A library for counting the method and field references in Android DEX
//! files, grouped by package, to keep an eye on the 64K reference limit.
//!
//! # Examples
//!
//! ```no_run
//!  use dexcount::count::{CountOptions, DexCounter};
//!  use dexcount::dex::DexFile;
//!  use std::path::Path;
//!
//!  let dex = DexFile::from_file(Path::new("classes.dex")).unwrap();
//!  let mut counter = DexCounter::new(CountOptions::default());
//!  counter.generate(&dex).unwrap();
//!  counter.output(&mut std::io::stdout()).unwrap();
//!  counter.output_total(&mut std::io::stdout()).unwrap();
//! ```
//!
#[macro_use]
pub mod dex;
pub mod count;
pub mod filter;
#[cfg(test)]
mod tests;
pub mod types;

pub use count::{count_dex, CountOptions, CountState, DexCounter, Node};
pub use dex::{DexError, DexErrorKind, DexFile};
pub use filter::Filter;
pub use types::OutputStyle;
