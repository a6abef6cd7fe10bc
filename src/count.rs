/* Package count trees and the per-input counter built on them */

use crate::dex::error::DexError;
use crate::dex::{DexFile, FieldRef, MethodRef, Reference};
use crate::filter::{select_references, Filter};
use crate::types::{class_name_dotted, package_name_only, OutputStyle};
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::io::{self, Read, Seek, Write};

/// Label for an empty package segment in tree output.
pub const DEFAULT_PACKAGE_LABEL: &str = "<default>";
/// Label for the empty package in flat output.
pub const NO_PACKAGE_LABEL: &str = "<no package>";

/// One level of a package count tree.
///
/// `names` keeps children in first-insertion order; a merged tree keeps them
/// sorted instead, so output does not depend on the order inputs were merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    count: usize,
    names: Vec<String>,
    children: HashMap<String, Node>,
}

impl Node {
    pub fn new() -> Node {
        Node::default()
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.get(name)
    }

    /// Children in iteration order.
    pub fn children(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.names
            .iter()
            .filter_map(move |n| self.children.get(n).map(|c| (n.as_str(), c)))
    }

    fn child_mut(&mut self, name: &str) -> &mut Node {
        if !self.children.contains_key(name) {
            self.names.push(name.to_string());
        }
        self.children.entry(name.to_string()).or_default()
    }

    /// Counts one reference at every prefix of `segments`, root included.
    ///
    /// At most `max_depth` levels below the root are materialised; deeper
    /// segments are folded into the deepest one created.
    pub fn insert(&mut self, segments: &[&str], max_depth: Option<usize>) {
        let depth = max_depth.map_or(segments.len(), |d| d.min(segments.len()));
        self.count += 1;
        let mut node = self;
        for segment in &segments[..depth] {
            node = node.child_mut(segment);
            node.count += 1;
        }
    }

    /// Counts one reference against `name` as a direct child of the root.
    pub fn insert_flat(&mut self, name: &str) {
        self.count += 1;
        self.child_mut(name).count += 1;
    }

    /// Combines two trees into a new one; neither input is changed.
    ///
    /// Counts add up node by node and children are sorted by name at every level.
    pub fn merge(&self, other: &Node) -> Node {
        let names: BTreeSet<&String> = self.names.iter().chain(other.names.iter()).collect();
        let mut merged = Node {
            count: self.count + other.count,
            names: Vec::with_capacity(names.len()),
            children: HashMap::with_capacity(names.len()),
        };
        for name in names {
            let child = match (self.children.get(name), other.children.get(name)) {
                (Some(a), Some(b)) => a.merge(b),
                (Some(a), None) => a.sorted(),
                (None, Some(b)) => b.sorted(),
                (None, None) => continue,
            };
            merged.names.push(name.clone());
            merged.children.insert(name.clone(), child);
        }
        merged
    }

    fn sorted(&self) -> Node {
        self.merge(&Node::new())
    }

    pub fn render<W: Write>(&self, style: OutputStyle, out: &mut W) -> io::Result<()> {
        match style {
            OutputStyle::Tree => {
                writeln!(out, "<root>: {}", self.count)?;
                self.render_tree(1, out)
            }
            OutputStyle::Flat => self.render_flat(out),
        }
    }

    fn render_tree<W: Write>(&self, depth: usize, out: &mut W) -> io::Result<()> {
        let indent = "    ".repeat(depth);
        for (name, child) in self.children() {
            let label = if name.is_empty() { DEFAULT_PACKAGE_LABEL } else { name };
            writeln!(out, "{}{}: {}", indent, label, child.count)?;
            child.render_tree(depth + 1, out)?;
        }
        Ok(())
    }

    fn render_flat<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for (name, child) in self.children() {
            let label = if name.is_empty() { NO_PACKAGE_LABEL } else { name };
            writeln!(out, "{:6} {}", child.count, label)?;
        }
        Ok(())
    }
}

// Serialised as `{count, children}` with children as a map in iteration order.
impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Node", 2)?;
        s.serialize_field("count", &self.count)?;
        s.serialize_field("children", &Children(self))?;
        s.end()
    }
}

struct Children<'a>(&'a Node);

impl Serialize for Children<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.children())
    }
}

/// Options a counting run is configured with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CountOptions {
    /// Group by full class name rather than package.
    pub include_classes: bool,
    /// Only count names starting with this; empty matches everything.
    pub package_filter: String,
    /// Tree levels below the root; `None` is unbounded.
    pub max_depth: Option<usize>,
    pub filter: Filter,
    pub output_style: OutputStyle,
    /// Count field references instead of method references.
    pub count_fields: bool,
}

impl CountOptions {
    fn kind(&self) -> &'static str {
        if self.count_fields { FieldRef::KIND } else { MethodRef::KIND }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CountState {
    pub overall_count: usize,
    pub package_tree: Node,
}

impl CountState {
    pub fn merge(&self, other: &CountState) -> CountState {
        CountState {
            overall_count: self.overall_count + other.overall_count,
            package_tree: self.package_tree.merge(&other.package_tree),
        }
    }
}

/// Dotted name a reference is grouped under.
pub fn qualified_name(decl_class: &str, include_classes: bool) -> String {
    if include_classes {
        class_name_dotted(decl_class)
    } else {
        package_name_only(decl_class)
    }
}

/// Builds the count state of one DEX file for references of kind `T`.
pub fn count_references<T: Reference>(dex: &DexFile, options: &CountOptions) -> Result<CountState, DexError> {
    let refs: Vec<T> = select_references(dex, options.filter)?;
    let mut state = CountState::default();

    for r in &refs {
        let name = qualified_name(r.declaring_class(), options.include_classes);
        if !options.package_filter.is_empty() && !name.starts_with(&options.package_filter) {
            continue;
        }

        state.overall_count += 1;
        match options.output_style {
            OutputStyle::Tree => {
                let segments: Vec<&str> = name.split('.').collect();
                state.package_tree.insert(&segments, options.max_depth);
            }
            OutputStyle::Flat => state.package_tree.insert_flat(&name),
        }
    }

    Ok(state)
}

/// Counts one DEX file with the method or field generator `options` selects.
pub fn count_dex(dex: &DexFile, options: &CountOptions) -> Result<CountState, DexError> {
    if options.count_fields {
        count_references::<FieldRef>(dex, options)
    } else {
        count_references::<MethodRef>(dex, options)
    }
}

/// Accumulates counts over the DEX files of one input.
#[derive(Debug, Clone, Default)]
pub struct DexCounter {
    options: CountOptions,
    state: CountState,
}

impl DexCounter {
    pub fn new(options: CountOptions) -> DexCounter {
        DexCounter { options, state: CountState::default() }
    }

    pub fn options(&self) -> &CountOptions {
        &self.options
    }

    pub fn state(&self) -> &CountState {
        &self.state
    }

    pub fn overall_count(&self) -> usize {
        self.state.overall_count
    }

    pub fn generate(&mut self, dex: &DexFile) -> Result<(), DexError> {
        let state = count_dex(dex, &self.options)?;
        self.state = self.state.merge(&state);
        Ok(())
    }

    /// Parses `source` and counts it; nothing is added if parsing fails.
    pub fn generate_from<R: Read + Seek>(&mut self, source: &mut R) -> Result<(), DexError> {
        let dex = DexFile::read(source)?;
        self.generate(&dex)
    }

    /// Writes the tree (or flat listing) without the overall line.
    pub fn output<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.state.package_tree.render(self.options.output_style, out)
    }

    pub fn output_total<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "Overall {} count: {}", self.options.kind(), self.state.overall_count)
    }
}
