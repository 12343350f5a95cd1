//! Scope contexts for semantic analysis
//!
//! A chain of frames, each borrowing its parent. The analyzer hands the
//! current frame down every recursive call, so a frame lives exactly as long
//! as the construct that opened it.

use std::collections::HashMap;

use log::trace;

use crate::middle::ast::{Entities, Function, FunctionId, Variable, VariableId};
use crate::stdlib::{BuiltinKind, BuiltinRegistry};
use crate::types::{StructId, Type};

/// What a name is bound to
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Variable(VariableId),
    Function(FunctionId),
    /// A struct or class: usable as a type name and as a constructor
    Struct(StructId),
    /// A primitive type name
    Type(Type),
}

/// Frame settings a child overrides; `None` inherits from the parent
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub in_loop: Option<bool>,
    pub function: Option<Option<FunctionId>>,
}

/// One frame of the scope chain
#[derive(Debug)]
pub struct Context<'p> {
    parent: Option<&'p Context<'p>>,
    locals: HashMap<String, Entity>,
    in_loop: bool,
    function: Option<FunctionId>,
}

impl Context<'static> {
    /// The outermost frame: primitive type names and the standard library,
    /// whose entities are allocated in `entities`
    pub fn root(entities: &mut Entities) -> Self {
        let mut context = Context {
            parent: None,
            locals: HashMap::new(),
            in_loop: false,
            function: None,
        };

        for (name, ty) in [
            ("number", Type::Number),
            ("string", Type::String),
            ("boolean", Type::Bool),
            ("void", Type::Void),
        ] {
            context.add(name, Entity::Type(ty));
        }

        for entry in BuiltinRegistry::new().iter() {
            let entity = match &entry.kind {
                BuiltinKind::Constant(ty) => Entity::Variable(entities.add_variable(Variable {
                    name: entry.name.to_string(),
                    read_only: true,
                    ty: ty.clone(),
                })),
                BuiltinKind::Function(ty) => Entity::Function(entities.add_function(Function {
                    name: entry.name.to_string(),
                    ty: ty.clone(),
                    builtin: true,
                })),
            };
            for alias in entry.aliases {
                context.add(*alias, entity.clone());
            }
            context.add(entry.name, entity);
        }

        trace!("root scope holds {} names", context.locals.len());
        context
    }
}

impl<'p> Context<'p> {
    /// Nearest binding of `name`, searching this frame then its ancestors
    pub fn lookup(&self, name: &str) -> Option<&Entity> {
        let mut frame = Some(self);
        while let Some(context) = frame {
            if let Some(entity) = context.locals.get(name) {
                return Some(entity);
            }
            frame = context.parent;
        }
        None
    }

    /// Whether `name` is bound in this frame itself
    pub fn declares(&self, name: &str) -> bool {
        self.locals.contains_key(name)
    }

    /// Bind `name` in this frame. Uniqueness is the caller's concern.
    pub fn add(&mut self, name: impl Into<String>, entity: Entity) {
        self.locals.insert(name.into(), entity);
    }

    pub fn in_loop(&self) -> bool {
        self.in_loop
    }

    /// The function whose body is being analyzed, if any
    pub fn function(&self) -> Option<FunctionId> {
        self.function
    }

    pub fn child(&self, overrides: Overrides) -> Context<'_> {
        Context {
            parent: Some(self),
            locals: HashMap::new(),
            in_loop: overrides.in_loop.unwrap_or(self.in_loop),
            function: overrides.function.unwrap_or(self.function),
        }
    }

    /// Plain nested block: everything inherited
    pub fn block(&self) -> Context<'_> {
        self.child(Overrides::default())
    }

    pub fn loop_body(&self) -> Context<'_> {
        self.child(Overrides {
            in_loop: Some(true),
            function: None,
        })
    }

    /// A function body leaves any enclosing loop behind
    pub fn function_body(&self, function: FunctionId) -> Context<'_> {
        self.child(Overrides {
            in_loop: Some(false),
            function: Some(Some(function)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_root_has_types_and_stdlib() {
        let mut entities = Entities::new();
        let root = Context::root(&mut entities);
        assert_eq!(root.lookup("boolean"), Some(&Entity::Type(Type::Bool)));
        assert!(matches!(root.lookup("sqrt"), Some(Entity::Function(_))));
        assert_eq!(root.lookup("pi"), root.lookup("π"));
        let Some(Entity::Variable(pi)) = root.lookup("pi") else {
            panic!("pi should be a variable");
        };
        assert!(entities.variable(*pi).read_only);
        assert!(entities.functions.iter().all(|f| f.builtin));
    }

    #[test]
    fn test_lookup_walks_ancestors_and_shadows() {
        let mut entities = Entities::new();
        let mut root = Context::root(&mut entities);
        root.add("x", Entity::Variable(VariableId(100)));

        let mut inner = root.block();
        assert_eq!(inner.lookup("x"), Some(&Entity::Variable(VariableId(100))));
        assert!(!inner.declares("x"));

        inner.add("x", Entity::Variable(VariableId(200)));
        assert_eq!(inner.lookup("x"), Some(&Entity::Variable(VariableId(200))));
        assert!(inner.lookup("nope").is_none());
    }

    #[test]
    fn test_overrides_inherit_unless_given() {
        let mut entities = Entities::new();
        let root = Context::root(&mut entities);
        assert!(!root.in_loop());
        assert_eq!(root.function(), None);

        let body = root.function_body(FunctionId(7));
        let looped = body.loop_body();
        let nested = looped.block();
        assert!(nested.in_loop());
        assert_eq!(nested.function(), Some(FunctionId(7)));

        let inner_fn = nested.function_body(FunctionId(8));
        assert!(!inner_fn.in_loop());
        assert_eq!(inner_fn.function(), Some(FunctionId(8)));
    }
}
