/* Conversions from DEX type descriptors (e.g. Ljava/lang/String;) to dotted Java names */

use crate::dex::error::DexError;
use log::warn;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Converts a single-character primitive type into its human-readable equivalent.
pub fn primitive_type_label(type_char: u8) -> &'static str
{
    match type_char
    {
        b'B' => "byte",
        b'C' => "char",
        b'D' => "double",
        b'F' => "float",
        b'I' => "int",
        b'J' => "long",
        b'S' => "short",
        b'V' => "void",
        b'Z' => "boolean",
        _ => {
            warn!("Unexpected class char {:?}", type_char as char);
            "UNKNOWN"
        }
    }
}

/// Converts a type descriptor to human-readable "dotted" form.
///
/// # Examples
///
/// ```
/// use dexcount::types::descriptor_to_dot;
///
/// assert_eq!(descriptor_to_dot("Ljava/lang/String;"), "java.lang.String");
/// assert_eq!(descriptor_to_dot("[I"), "int[]");
/// assert_eq!(descriptor_to_dot("[[Ljava/lang/Object;"), "java.lang.Object[][]");
/// ```
pub fn descriptor_to_dot(descr: &str) -> String
{
    let mut rest = descr;
    let mut array_depth = 0;

    // strip leading [s; they come back as trailing []s
    while rest.len() > 1 && rest.starts_with('[')
    {
        rest = &rest[1..];
        array_depth += 1;
    }

    let mut name = if rest.len() == 1
    {
        primitive_type_label(rest.as_bytes()[0]).to_string()
    }
    else if rest.len() >= 2 && rest.starts_with('L') && rest.ends_with(';')
    {
        rest[1..rest.len() - 1].replace('/', ".")
    }
    else
    {
        rest.replace('/', ".")
    };

    for _ in 0..array_depth
    {
        name.push_str("[]");
    }
    name
}

/// Extracts the package from a type descriptor, in dotted form.
///
/// Classes in the default package, and primitives and their arrays, yield "".
pub fn package_name_only(descr: &str) -> String
{
    let mut dotted = descriptor_to_dot(descr);
    match dotted.rfind('.')
    {
        Some(end) => {
            dotted.truncate(end);
            dotted
        }
        None => String::new(),
    }
}

/// Full class name with inner-class separators turned into dots.
pub fn class_name_dotted(descr: &str) -> String
{
    descriptor_to_dot(descr).replace('$', ".")
}

/// How a count tree is laid out when rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum OutputStyle
{
    #[default]
    Tree,
    Flat,
}

impl fmt::Display for OutputStyle
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
    {
        match self
        {
            OutputStyle::Tree => write!(f, "TREE"),
            OutputStyle::Flat => write!(f, "FLAT"),
        }
    }
}

impl FromStr for OutputStyle
{
    type Err = DexError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str()
        {
            "tree" => Ok(OutputStyle::Tree),
            "flat" => Ok(OutputStyle::Flat),
            other => Err(err!(InvalidOption, "invalid output style {}", other)),
        }
    }
}
