//! Per-module data layout: sizes, alignments, and struct field offsets.

use crate::module::Module;
use crate::types::{StructDef, Type};

/// Size and alignment rules of one module. Each compared module carries its
/// own layout, so the same struct type may have different sizes on the two
/// sides of a comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataLayout {
    /// Pointer size in bytes.
    pub pointer_bytes: u64,
    /// Maximum natural alignment in bytes.
    pub max_align: u64,
}

impl Default for DataLayout {
    fn default() -> Self {
        Self {
            pointer_bytes: 8,
            max_align: 8,
        }
    }
}

impl DataLayout {
    /// Storage size of a type in bytes. Returns `None` when the type refers
    /// to a struct the module does not define.
    pub fn size_of(&self, module: &Module, ty: &Type) -> Option<u64> {
        match ty {
            Type::Void => Some(0),
            Type::Int(bits) | Type::Float(bits) => Some(u64::from(*bits).div_ceil(8)),
            Type::Ptr => Some(self.pointer_bytes),
            Type::Array { elem, len } => {
                let elem_size = self.size_of(module, elem)?;
                Some(elem_size * len)
            }
            Type::Struct(name) => {
                let def = module.struct_def(name)?;
                self.struct_size(module, def)
            }
        }
    }

    /// Alignment of a type in bytes.
    pub fn align_of(&self, module: &Module, ty: &Type) -> Option<u64> {
        match ty {
            Type::Void => Some(1),
            Type::Int(_) | Type::Float(_) | Type::Ptr => {
                let size = self.size_of(module, ty)?;
                Some(size.next_power_of_two().clamp(1, self.max_align))
            }
            Type::Array { elem, .. } => self.align_of(module, elem),
            Type::Struct(name) => {
                let def = module.struct_def(name)?;
                if def.is_packed {
                    return Some(1);
                }
                let mut align = 1;
                for field in &def.fields {
                    align = align.max(self.align_of(module, field)?);
                }
                Some(align)
            }
        }
    }

    /// Total size of a struct or union definition, including padding.
    pub fn struct_size(&self, module: &Module, def: &StructDef) -> Option<u64> {
        if def.is_union {
            let mut size = 0;
            for field in &def.fields {
                size = size.max(self.size_of(module, field)?);
            }
            let align = self.align_of(module, &Type::Struct(def.name.clone()))?;
            return Some(size.div_ceil(align) * align);
        }
        let end = self.field_offset(module, def, def.fields.len())?;
        let align = self.align_of(module, &Type::Struct(def.name.clone()))?;
        Some(end.div_ceil(align) * align)
    }

    /// Byte offset of field `index` within `def`. Passing `fields.len()`
    /// yields the unpadded end offset. Union fields are all at offset zero.
    pub fn field_offset(&self, module: &Module, def: &StructDef, index: usize) -> Option<u64> {
        if index > def.fields.len() {
            return None;
        }
        if def.is_union {
            return Some(0);
        }
        let mut offset: u64 = 0;
        for field in def.fields.iter().take(index) {
            if !def.is_packed {
                let align = self.align_of(module, field)?;
                offset = offset.div_ceil(align) * align;
            }
            offset += self.size_of(module, field)?;
        }
        if index < def.fields.len() && !def.is_packed {
            let align = self.align_of(module, &def.fields[index])?;
            offset = offset.div_ceil(align) * align;
        }
        Some(offset)
    }
}
