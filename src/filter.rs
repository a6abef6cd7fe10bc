/* Narrowing references to those defined in, or only referenced by, a DEX file */

use crate::dex::error::DexError;
use crate::dex::{DexFile, Reference};
use log::info;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Filter
{
    /// Every reference in the file.
    #[default]
    All,
    /// References whose declaring class is defined in the file.
    DefinedOnly,
    /// References to classes the file does not define.
    ReferencedOnly,
}

impl fmt::Display for Filter
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
    {
        match self
        {
            Filter::All => write!(f, "ALL"),
            Filter::DefinedOnly => write!(f, "DEFINED_ONLY"),
            Filter::ReferencedOnly => write!(f, "REFERENCED_ONLY"),
        }
    }
}

impl FromStr for Filter
{
    type Err = DexError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str()
        {
            "all" => Ok(Filter::All),
            "defined_only" => Ok(Filter::DefinedOnly),
            "referenced_only" => Ok(Filter::ReferencedOnly),
            other => Err(err!(InvalidOption, "invalid filter {}", other)),
        }
    }
}

/// Keeps the references `filter` selects, preserving their order.
///
/// `external` holds the references owned by the file's external class refs.
pub fn select<T: Eq + Hash>(filter: Filter, refs: Vec<T>, external: &HashSet<T>) -> Vec<T>
{
    match filter
    {
        Filter::All => refs,
        Filter::DefinedOnly => refs.into_iter().filter(|r| !external.contains(r)).collect(),
        Filter::ReferencedOnly => refs.into_iter().filter(|r| external.contains(r)).collect(),
    }
}

/// Resolves every reference of kind `T` in `dex` and applies `filter`.
pub fn select_references<T: Reference>(dex: &DexFile, filter: Filter) -> Result<Vec<T>, DexError>
{
    let refs = T::collect(dex)?;
    info!("Read in {} {} IDs.", refs.len(), T::KIND);
    if filter == Filter::All
    {
        return Ok(refs);
    }

    let class_refs = dex.external_references()?;
    info!("Read in {} external class references.", class_refs.len());

    let external: HashSet<T> = class_refs
        .iter()
        .flat_map(|c| T::external_of(c).iter().cloned())
        .collect();
    info!("Read in {} external {} references.", external.len(), T::KIND);

    let selected = select(filter, refs, &external);
    match filter
    {
        Filter::DefinedOnly => info!("Filtered to {} defined.", selected.len()),
        _ => info!("Filtered to {} referenced.", selected.len()),
    }
    Ok(selected)
}
