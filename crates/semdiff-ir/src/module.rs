//! Module IR: functions, globals, named types, and layout.

use crate::function::Function;
use crate::layout::DataLayout;
use crate::types::{StructDef, Type};
use crate::value::FuncId;

/// A module-level global variable.
#[derive(Clone, Debug, PartialEq)]
pub struct GlobalVar {
    pub name: String,
    pub ty: Type,
    pub is_constant: bool,
}

/// One side of a comparison: a set of functions with their own type
/// definitions and layout rules.
#[derive(Clone, Debug, PartialEq)]
pub struct Module {
    pub name: String,
    pub layout: DataLayout,
    pub structs: Vec<StructDef>,
    pub globals: Vec<GlobalVar>,
    pub functions: Vec<Function>,
}

impl Module {
    /// Create an empty module.
    pub fn new(name: &str, layout: DataLayout) -> Self {
        Self {
            name: name.to_string(),
            layout,
            structs: Vec::new(),
            globals: Vec::new(),
            functions: Vec::new(),
        }
    }

    /// Add a struct or union definition.
    pub fn add_struct(&mut self, def: StructDef) {
        self.structs.push(def);
    }

    /// Add a global variable.
    pub fn add_global(&mut self, global: GlobalVar) {
        self.globals.push(global);
    }

    /// Add a function, returning its id.
    pub fn add_function(&mut self, func: Function) -> FuncId {
        let id = FuncId(u32::try_from(self.functions.len()).unwrap_or(u32::MAX));
        self.functions.push(func);
        id
    }

    /// Get a function by id.
    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.0 as usize]
    }

    /// Look up a function by name.
    pub fn function_by_name(&self, name: &str) -> Option<(FuncId, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == name)
            .map(|(idx, f)| (FuncId(u32::try_from(idx).unwrap_or(u32::MAX)), f))
    }

    /// Look up a struct or union definition by name.
    pub fn struct_def(&self, name: &str) -> Option<&StructDef> {
        self.structs.iter().find(|def| def.name == name)
    }

    /// Look up a global variable by name.
    pub fn global_by_name(&self, name: &str) -> Option<&GlobalVar> {
        self.globals.iter().find(|g| g.name == name)
    }
}
