use std::collections::HashMap;

use crate::model::{MethodId, Universe};

/// A reflection API whose arguments the detector knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum ReflectionApi {
    /// `Type.GetMethod(string[, BindingFlags])`
    TypeGetMethod,
    /// `Type.GetField(string[, BindingFlags])`
    TypeGetField,
    /// `Type.GetProperty(string[, BindingFlags])`
    TypeGetProperty,
    /// `Type.GetEvent(string[, BindingFlags])`
    TypeGetEvent,
    /// `Type.GetConstructor(Type[])`
    TypeGetConstructor,
    /// `Type.GetType(string)`
    TypeGetType,
    /// `Activator.CreateInstance(Type)`
    ActivatorCreateInstance,
    /// `Activator.CreateInstance<T>()`
    ActivatorCreateInstanceGeneric,
    /// `Activator.CreateInstance(string assemblyName, string typeName)`
    ActivatorCreateInstanceByName,
    /// `AppDomain.CreateInstance[AndUnwrap](string assemblyName, string typeName)`
    AppDomainCreateInstance,
    /// `Expression.Call(Type, string, Type[], Expression[])`
    ExpressionCall,
    /// `Expression.Property(Expression, Type, string)`
    ExpressionProperty,
    /// `Expression.Field(Expression, Type, string)`
    ExpressionField,
    /// `Expression.New(Type)`
    ExpressionNew,
    /// `RuntimeReflectionExtensions.GetRuntimeMethod(Type, string, Type[])`
    GetRuntimeMethod,
    /// `RuntimeReflectionExtensions.GetRuntimeField(Type, string)`
    GetRuntimeField,
    /// `RuntimeReflectionExtensions.GetRuntimeProperty(Type, string)`
    GetRuntimeProperty,
    /// `RuntimeReflectionExtensions.GetRuntimeEvent(Type, string)`
    GetRuntimeEvent,
}

/// Where the interesting arguments of an API sit, as argument indices including `this`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArgumentLayout {
    /// The `System.Type` being searched
    pub type_arg: Option<usize>,
    /// The member or type name
    pub name_arg: Option<usize>,
    /// The `BindingFlags` filter
    pub flags_arg: Option<usize>,
    /// The assembly name
    pub assembly_arg: Option<usize>,
}

impl ReflectionApi {
    /// The argument layout of this API. Instance methods count `this` as argument 0.
    #[must_use]
    pub fn layout(self, has_flags: bool) -> ArgumentLayout {
        use ReflectionApi::*;
        let layout = |type_arg, name_arg| ArgumentLayout {
            type_arg,
            name_arg,
            ..ArgumentLayout::default()
        };
        match self {
            TypeGetMethod | TypeGetField | TypeGetProperty | TypeGetEvent => ArgumentLayout {
                type_arg: Some(0),
                name_arg: Some(1),
                flags_arg: has_flags.then_some(2),
                assembly_arg: None,
            },
            TypeGetConstructor => layout(Some(0), None),
            TypeGetType => layout(None, Some(0)),
            ActivatorCreateInstance | ExpressionNew => layout(Some(0), None),
            ActivatorCreateInstanceGeneric => layout(None, None),
            ActivatorCreateInstanceByName => ArgumentLayout {
                name_arg: Some(1),
                assembly_arg: Some(0),
                ..ArgumentLayout::default()
            },
            AppDomainCreateInstance => ArgumentLayout {
                name_arg: Some(2),
                assembly_arg: Some(1),
                ..ArgumentLayout::default()
            },
            ExpressionCall | GetRuntimeMethod | GetRuntimeField | GetRuntimeProperty
            | GetRuntimeEvent => layout(Some(0), Some(1)),
            ExpressionProperty | ExpressionField => layout(Some(1), Some(2)),
        }
    }
}

/// `(declaring type, method name, parameter count, generic parameter count)`
const KNOWN_APIS: &[(&str, &str, usize, usize, ReflectionApi)] = &[
    ("System.Type", "GetMethod", 1, 0, ReflectionApi::TypeGetMethod),
    ("System.Type", "GetMethod", 2, 0, ReflectionApi::TypeGetMethod),
    ("System.Type", "GetField", 1, 0, ReflectionApi::TypeGetField),
    ("System.Type", "GetField", 2, 0, ReflectionApi::TypeGetField),
    ("System.Type", "GetProperty", 1, 0, ReflectionApi::TypeGetProperty),
    ("System.Type", "GetProperty", 2, 0, ReflectionApi::TypeGetProperty),
    ("System.Type", "GetEvent", 1, 0, ReflectionApi::TypeGetEvent),
    ("System.Type", "GetEvent", 2, 0, ReflectionApi::TypeGetEvent),
    ("System.Type", "GetConstructor", 1, 0, ReflectionApi::TypeGetConstructor),
    ("System.Type", "GetType", 1, 0, ReflectionApi::TypeGetType),
    ("System.Activator", "CreateInstance", 1, 0, ReflectionApi::ActivatorCreateInstance),
    ("System.Activator", "CreateInstance", 0, 1, ReflectionApi::ActivatorCreateInstanceGeneric),
    ("System.Activator", "CreateInstance", 2, 0, ReflectionApi::ActivatorCreateInstanceByName),
    ("System.AppDomain", "CreateInstance", 2, 0, ReflectionApi::AppDomainCreateInstance),
    ("System.AppDomain", "CreateInstanceAndUnwrap", 2, 0, ReflectionApi::AppDomainCreateInstance),
    ("System.Linq.Expressions.Expression", "Call", 4, 0, ReflectionApi::ExpressionCall),
    ("System.Linq.Expressions.Expression", "Property", 3, 0, ReflectionApi::ExpressionProperty),
    ("System.Linq.Expressions.Expression", "Field", 3, 0, ReflectionApi::ExpressionField),
    ("System.Linq.Expressions.Expression", "New", 1, 0, ReflectionApi::ExpressionNew),
    ("System.Reflection.RuntimeReflectionExtensions", "GetRuntimeMethod", 3, 0, ReflectionApi::GetRuntimeMethod),
    ("System.Reflection.RuntimeReflectionExtensions", "GetRuntimeField", 2, 0, ReflectionApi::GetRuntimeField),
    ("System.Reflection.RuntimeReflectionExtensions", "GetRuntimeProperty", 2, 0, ReflectionApi::GetRuntimeProperty),
    ("System.Reflection.RuntimeReflectionExtensions", "GetRuntimeEvent", 2, 0, ReflectionApi::GetRuntimeEvent),
];

/// Recognizes calls to reflection APIs, memoizing the answer per callee.
#[derive(Debug, Default)]
pub struct ReflectionCatalog {
    cache: HashMap<MethodId, Option<ReflectionApi>>,
}

impl ReflectionCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the API `callee` is, if the detector understands it.
    pub fn classify(&mut self, universe: &Universe, callee: MethodId) -> Option<ReflectionApi> {
        *self
            .cache
            .entry(callee)
            .or_insert_with(|| lookup(universe, callee))
    }
}

fn lookup(universe: &Universe, callee: MethodId) -> Option<ReflectionApi> {
    let def = universe.method(callee);
    let declaring = universe.type_full_name(universe.method_owner(callee));
    KNOWN_APIS
        .iter()
        .find(|(ty, name, params, generics, _)| {
            *ty == declaring
                && *name == def.name
                && *params == def.params.len()
                && *generics == def.generic_params.len()
        })
        .map(|&(.., api)| api)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::CoreLibrary, Result};

    #[test]
    fn test_classify_core_library_apis() -> Result<()> {
        let mut universe = Universe::new();
        let core = CoreLibrary::install(&mut universe)?;
        let mut catalog = ReflectionCatalog::new();

        let apis: Vec<ReflectionApi> = universe
            .type_def(core.type_type)
            .methods
            .clone()
            .into_iter()
            .filter_map(|m| catalog.classify(&universe, m))
            .collect();
        assert_eq!(apis.iter().filter(|a| **a == ReflectionApi::TypeGetMethod).count(), 2);
        assert!(apis.contains(&ReflectionApi::TypeGetType));
        assert!(catalog.classify(&universe, core.get_type_from_handle).is_none());
        assert!(catalog.classify(&universe, core.object_to_string).is_none());

        let generic = universe
            .methods_named(core.activator, "CreateInstance")
            .find(|&m| !universe.method(m).generic_params.is_empty());
        assert_eq!(
            generic.and_then(|m| catalog.classify(&universe, m)),
            Some(ReflectionApi::ActivatorCreateInstanceGeneric)
        );
        Ok(())
    }

    #[test]
    fn test_layout_counts_this() {
        let layout = ReflectionApi::TypeGetMethod.layout(true);
        assert_eq!(layout.type_arg, Some(0));
        assert_eq!(layout.name_arg, Some(1));
        assert_eq!(layout.flags_arg, Some(2));
        assert_eq!(ReflectionApi::TypeGetMethod.layout(false).flags_arg, None);
        assert_eq!(ReflectionApi::AppDomainCreateInstance.layout(false).assembly_arg, Some(1));
    }
}
