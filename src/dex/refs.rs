/* Resolved field and method references */

use crate::dex::dex_file::{DexFile, FieldItem, MethodItem, StringId, TypeId};
use crate::dex::error::DexError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::hash::Hash;

/// A field reference with every index resolved to its descriptor or name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FieldRef {
    /// Descriptor of the declaring class, e.g. `Ljava/lang/System;`.
    pub decl_class: String,
    pub field_type: String,
    pub field_name: String,
}

/// A method reference; two overloads differ by `arg_types` or `return_type`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MethodRef {
    pub decl_class: String,
    pub arg_types: Vec<String>,
    /// Examples: "Ljava/lang/String;", "[I".
    pub return_type: String,
    pub method_name: String,
}

/// A class referenced by, but not defined in, the DEX file, with the members
/// of it that the file refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassRef {
    pub class_name: String,
    pub field_refs: Vec<FieldRef>,
    pub method_refs: Vec<MethodRef>,
}

/// The seam between the resolver and everything that counts references, so
/// methods and fields share one code path.
pub trait Reference: Clone + Eq + Hash {
    /// "method" or "field", used in progress and total lines.
    const KIND: &'static str;

    fn declaring_class(&self) -> &str;

    /// Every reference of this kind, in table order.
    fn collect(dex: &DexFile) -> Result<Vec<Self>, DexError>;

    /// The references of this kind that a class reference owns.
    fn external_of(class_ref: &ClassRef) -> &[Self];
}

impl Reference for MethodRef {
    const KIND: &'static str = "method";

    fn declaring_class(&self) -> &str {
        &self.decl_class
    }

    fn collect(dex: &DexFile) -> Result<Vec<Self>, DexError> {
        dex.method_refs()
    }

    fn external_of(class_ref: &ClassRef) -> &[Self] {
        &class_ref.method_refs
    }
}

impl Reference for FieldRef {
    const KIND: &'static str = "field";

    fn declaring_class(&self) -> &str {
        &self.decl_class
    }

    fn collect(dex: &DexFile) -> Result<Vec<Self>, DexError> {
        dex.field_refs()
    }

    fn external_of(class_ref: &ClassRef) -> &[Self] {
        &class_ref.field_refs
    }
}

impl DexFile {
    pub fn string_at(&self, idx: StringId) -> Result<&str, DexError> {
        match self.strings.get(idx as usize) {
            Some(s) => Ok(s),
            None => fail!(IndexOutOfRange, "string #{} of {}", idx, self.strings.len()),
        }
    }

    /// Descriptor of the type at `idx`.
    pub fn class_name_of(&self, idx: TypeId) -> Result<&str, DexError> {
        match self.types.get(idx as usize) {
            Some(t) => self.string_at(t.descriptor_idx),
            None => fail!(IndexOutOfRange, "type #{} of {}", idx, self.types.len()),
        }
    }

    fn is_internal(&self, idx: TypeId) -> Result<bool, DexError> {
        match self.types.get(idx as usize) {
            Some(t) => Ok(t.internal),
            None => fail!(IndexOutOfRange, "type #{} of {}", idx, self.types.len()),
        }
    }

    /// Ordered argument descriptors and return descriptor of a prototype.
    pub fn method_signature_of(&self, idx: u32) -> Result<(Vec<String>, String), DexError> {
        let proto = match self.prototypes.get(idx as usize) {
            Some(p) => p,
            None => fail!(IndexOutOfRange, "proto #{} of {}", idx, self.prototypes.len()),
        };
        let args = proto
            .parameters
            .iter()
            .map(|t| self.class_name_of(*t as TypeId).map(str::to_string))
            .collect::<Result<Vec<_>, _>>()?;
        let ret = self.class_name_of(proto.return_type_idx)?.to_string();
        Ok((args, ret))
    }

    fn resolve_field(&self, f: &FieldItem) -> Result<FieldRef, DexError> {
        Ok(FieldRef {
            decl_class: self.class_name_of(f.class_idx as TypeId)?.to_string(),
            field_type: self.class_name_of(f.type_idx as TypeId)?.to_string(),
            field_name: self.string_at(f.name_idx)?.to_string(),
        })
    }

    fn resolve_method(&self, m: &MethodItem) -> Result<MethodRef, DexError> {
        let (arg_types, return_type) = self.method_signature_of(m.proto_idx as u32)?;
        Ok(MethodRef {
            decl_class: self.class_name_of(m.class_idx as TypeId)?.to_string(),
            arg_types,
            return_type,
            method_name: self.string_at(m.name_idx)?.to_string(),
        })
    }

    pub fn method_refs(&self) -> Result<Vec<MethodRef>, DexError> {
        self.methods.iter().map(|m| self.resolve_method(m)).collect()
    }

    pub fn field_refs(&self) -> Result<Vec<FieldRef>, DexError> {
        self.fields.iter().map(|f| self.resolve_field(f)).collect()
    }

    /// One `ClassRef` per external type id, in type id order, each holding the
    /// field and method references declared on it in table order.
    pub fn external_references(&self) -> Result<Vec<ClassRef>, DexError> {
        let mut refs: BTreeMap<TypeId, ClassRef> = BTreeMap::new();
        for (i, t) in self.types.iter().enumerate() {
            if !t.internal {
                let class_name = self.string_at(t.descriptor_idx)?.to_string();
                refs.insert(i as TypeId, ClassRef { class_name, ..ClassRef::default() });
            }
        }

        for f in &self.fields {
            let class_idx = f.class_idx as TypeId;
            if !self.is_internal(class_idx)? {
                let field_ref = self.resolve_field(f)?;
                if let Some(class_ref) = refs.get_mut(&class_idx) {
                    class_ref.field_refs.push(field_ref);
                }
            }
        }

        for m in &self.methods {
            let class_idx = m.class_idx as TypeId;
            if !self.is_internal(class_idx)? {
                let method_ref = self.resolve_method(m)?;
                if let Some(class_ref) = refs.get_mut(&class_idx) {
                    class_ref.method_refs.push(method_ref);
                }
            }
        }

        Ok(refs.into_values().collect())
    }
}
