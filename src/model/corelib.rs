//! A synthetic core library.
//!
//! The linker needs a handful of runtime types by name: the always-instantiated roots of the
//! type system, the exception used for throwing stubs, the reflection surface the pattern
//! detector recognizes and the dependency attributes. [`CoreLibrary::install`] adds a minimal
//! `System.Private.CoreLib` containing exactly those, with signatures matching the real
//! library closely enough for call-site stack simulation.

use crate::{
    model::{
        Accessibility, AssemblyId, MethodDef, MethodId, MethodModifiers, TypeAttributes,
        TypeDef, TypeId, TypeSig, Universe,
    },
    Result,
};

/// Name of the synthetic core library assembly.
pub const CORELIB_NAME: &str = "System.Private.CoreLib";

/// Handles to the well-known members of the synthetic core library.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub struct CoreLibrary {
    pub assembly: AssemblyId,
    pub object: TypeId,
    pub object_ctor: MethodId,
    pub object_to_string: MethodId,
    pub object_equals: MethodId,
    pub object_get_hash_code: MethodId,
    pub value_type: TypeId,
    pub enum_type: TypeId,
    pub delegate: TypeId,
    pub multicast_delegate: TypeId,
    pub string: TypeId,
    pub boolean: TypeId,
    pub int32: TypeId,
    pub int64: TypeId,
    pub exception: TypeId,
    pub not_supported_exception: TypeId,
    pub not_supported_exception_ctor: MethodId,
    pub attribute: TypeId,
    pub attribute_ctor: MethodId,
    pub runtime_type_handle: TypeId,
    pub type_type: TypeId,
    pub get_type_from_handle: MethodId,
    pub binding_flags: TypeId,
    pub method_info: TypeId,
    pub field_info: TypeId,
    pub property_info: TypeId,
    pub event_info: TypeId,
    pub constructor_info: TypeId,
    pub activator: TypeId,
    pub app_domain: TypeId,
    pub object_handle: TypeId,
    pub expression: TypeId,
    pub reflection_extensions: TypeId,
    pub dynamic_dependency_attribute: TypeId,
    pub dynamic_dependency_ctors: [MethodId; 3],
    pub preserve_dependency_attribute: TypeId,
    pub preserve_dependency_ctors: [MethodId; 3],
}

impl CoreLibrary {
    /// Adds the core library assembly to `universe`.
    ///
    /// # Errors
    ///
    /// Returns an error if the universe already contains an assembly named
    /// [`CORELIB_NAME`] or one of the well-known types.
    pub fn install(universe: &mut Universe) -> Result<CoreLibrary> {
        let asm = universe.add_assembly(CORELIB_NAME)?;
        let mut b = Builder { universe, asm };

        let object = b.class("System", "Object", None)?;
        let obj = TypeSig::Def(object);
        let object_ctor = b.method(object, MethodDef::constructor())?;
        let object_to_string = b.method(object, virtual_new("ToString").returning(TypeSig::Void))?;
        let object_equals = b.method(object, virtual_new("Equals").with_params(vec![obj.clone()]))?;
        let object_get_hash_code = b.method(object, virtual_new("GetHashCode"))?;

        let value_type = b.class("System", "ValueType", Some(&obj))?;
        let enum_type = b.class("System", "Enum", Some(&TypeSig::Def(value_type)))?;
        let vt = TypeSig::Def(value_type);
        let string = b.class("System", "String", Some(&obj))?;
        let boolean = b.class("System", "Boolean", Some(&vt))?;
        let int32 = b.class("System", "Int32", Some(&vt))?;
        let int64 = b.class("System", "Int64", Some(&vt))?;
        let str_sig = TypeSig::Def(string);
        // Fix up Object's signatures now that String exists.
        if let Some(to_string) = b.universe.method_mut(object_to_string) {
            to_string.return_type = str_sig.clone();
        }
        if let Some(hash) = b.universe.method_mut(object_get_hash_code) {
            hash.return_type = TypeSig::Def(int32);
        }
        if let Some(equals) = b.universe.method_mut(object_equals) {
            equals.return_type = TypeSig::Def(boolean);
        }

        let delegate = b.class("System", "Delegate", Some(&obj))?;
        let multicast_delegate =
            b.class("System", "MulticastDelegate", Some(&TypeSig::Def(delegate)))?;

        let exception = b.class("System", "Exception", Some(&obj))?;
        b.method(exception, MethodDef::constructor())?;
        let system_exception = b.class("System", "SystemException", Some(&TypeSig::Def(exception)))?;
        b.method(system_exception, MethodDef::constructor())?;
        let not_supported_exception = b.class(
            "System",
            "NotSupportedException",
            Some(&TypeSig::Def(system_exception)),
        )?;
        let not_supported_exception_ctor = b.method(not_supported_exception, MethodDef::constructor())?;

        let attribute = b.class("System", "Attribute", Some(&obj))?;
        let attribute_ctor = b.method(
            attribute,
            MethodDef::constructor().with_access(Accessibility::Family),
        )?;

        let runtime_type_handle = b.class("System", "RuntimeTypeHandle", Some(&vt))?;
        let member_info = b.class("System.Reflection", "MemberInfo", Some(&obj))?;
        let mi = TypeSig::Def(member_info);
        let type_type = b.class("System", "Type", Some(&mi))?;
        let ty = TypeSig::Def(type_type);
        let types = TypeSig::array_of(ty.clone());
        let binding_flags = b.class("System.Reflection", "BindingFlags", Some(&TypeSig::Def(enum_type)))?;
        let bf = TypeSig::Def(binding_flags);
        let method_info = b.class("System.Reflection", "MethodInfo", Some(&mi))?;
        let field_info = b.class("System.Reflection", "FieldInfo", Some(&mi))?;
        let property_info = b.class("System.Reflection", "PropertyInfo", Some(&mi))?;
        let event_info = b.class("System.Reflection", "EventInfo", Some(&mi))?;
        let constructor_info = b.class("System.Reflection", "ConstructorInfo", Some(&mi))?;

        let get_type_from_handle = b.method(
            type_type,
            static_method("GetTypeFromHandle")
                .with_params(vec![TypeSig::Def(runtime_type_handle)])
                .returning(ty.clone()),
        )?;
        for (name, result) in [
            ("GetMethod", method_info),
            ("GetField", field_info),
            ("GetProperty", property_info),
            ("GetEvent", event_info),
        ] {
            b.method(type_type, MethodDef::new(name).with_params(vec![str_sig.clone()]).returning(result))?;
            b.method(
                type_type,
                MethodDef::new(name)
                    .with_params(vec![str_sig.clone(), bf.clone()])
                    .returning(result),
            )?;
        }
        b.method(
            type_type,
            MethodDef::new("GetConstructor")
                .with_params(vec![types.clone()])
                .returning(constructor_info),
        )?;
        b.method(
            type_type,
            static_method("GetType")
                .with_params(vec![str_sig.clone()])
                .returning(ty.clone()),
        )?;

        let object_handle = b.class("System.Runtime.Remoting", "ObjectHandle", Some(&obj))?;
        let activator = b.class("System", "Activator", Some(&obj))?;
        b.method(
            activator,
            static_method("CreateInstance")
                .with_params(vec![ty.clone()])
                .returning(obj.clone()),
        )?;
        b.method(
            activator,
            static_method("CreateInstance")
                .with_generic_params(&["T"])
                .returning(TypeSig::MVar(0)),
        )?;
        b.method(
            activator,
            static_method("CreateInstance")
                .with_params(vec![str_sig.clone(), str_sig.clone()])
                .returning(object_handle),
        )?;

        let app_domain = b.class("System", "AppDomain", Some(&obj))?;
        b.method(
            app_domain,
            MethodDef::new("CreateInstance")
                .with_params(vec![str_sig.clone(), str_sig.clone()])
                .returning(object_handle),
        )?;
        b.method(
            app_domain,
            MethodDef::new("CreateInstanceAndUnwrap")
                .with_params(vec![str_sig.clone(), str_sig.clone()])
                .returning(obj.clone()),
        )?;

        let expression = b.class("System.Linq.Expressions", "Expression", Some(&obj))?;
        let expr = TypeSig::Def(expression);
        let expr_call = b.class("System.Linq.Expressions", "MethodCallExpression", Some(&expr))?;
        let expr_member = b.class("System.Linq.Expressions", "MemberExpression", Some(&expr))?;
        let expr_new = b.class("System.Linq.Expressions", "NewExpression", Some(&expr))?;
        b.method(
            expression,
            static_method("Call")
                .with_params(vec![
                    ty.clone(),
                    str_sig.clone(),
                    types.clone(),
                    TypeSig::array_of(expr.clone()),
                ])
                .returning(expr_call),
        )?;
        for name in ["Property", "Field"] {
            b.method(
                expression,
                static_method(name)
                    .with_params(vec![expr.clone(), ty.clone(), str_sig.clone()])
                    .returning(expr_member),
            )?;
        }
        b.method(
            expression,
            static_method("New").with_params(vec![ty.clone()]).returning(expr_new),
        )?;

        let reflection_extensions =
            b.class("System.Reflection", "RuntimeReflectionExtensions", Some(&obj))?;
        b.method(
            reflection_extensions,
            static_method("GetRuntimeMethod")
                .with_params(vec![ty.clone(), str_sig.clone(), types])
                .returning(method_info),
        )?;
        for (name, result) in [
            ("GetRuntimeField", field_info),
            ("GetRuntimeProperty", property_info),
            ("GetRuntimeEvent", event_info),
        ] {
            b.method(
                reflection_extensions,
                static_method(name)
                    .with_params(vec![ty.clone(), str_sig.clone()])
                    .returning(result),
            )?;
        }

        let attr = TypeSig::Def(attribute);
        let dynamic_dependency_attribute = b.class(
            "System.Diagnostics.CodeAnalysis",
            "DynamicDependencyAttribute",
            Some(&attr),
        )?;
        let dynamic_dependency_ctors = [
            b.method(
                dynamic_dependency_attribute,
                MethodDef::constructor().with_params(vec![str_sig.clone()]),
            )?,
            b.method(
                dynamic_dependency_attribute,
                MethodDef::constructor().with_params(vec![str_sig.clone(), ty]),
            )?,
            b.method(
                dynamic_dependency_attribute,
                MethodDef::constructor().with_params(vec![
                    str_sig.clone(),
                    str_sig.clone(),
                    str_sig.clone(),
                ]),
            )?,
        ];
        let preserve_dependency_attribute = b.class(
            "System.Runtime.CompilerServices",
            "PreserveDependencyAttribute",
            Some(&attr),
        )?;
        let preserve_dependency_ctors = [
            b.method(
                preserve_dependency_attribute,
                MethodDef::constructor().with_params(vec![str_sig.clone()]),
            )?,
            b.method(
                preserve_dependency_attribute,
                MethodDef::constructor().with_params(vec![str_sig.clone(), str_sig.clone()]),
            )?,
            b.method(
                preserve_dependency_attribute,
                MethodDef::constructor().with_params(vec![
                    str_sig.clone(),
                    str_sig.clone(),
                    str_sig,
                ]),
            )?,
        ];

        Ok(CoreLibrary {
            assembly: asm,
            object,
            object_ctor,
            object_to_string,
            object_equals,
            object_get_hash_code,
            value_type,
            enum_type,
            delegate,
            multicast_delegate,
            string,
            boolean,
            int32,
            int64,
            exception,
            not_supported_exception,
            not_supported_exception_ctor,
            attribute,
            attribute_ctor,
            runtime_type_handle,
            type_type,
            get_type_from_handle,
            binding_flags,
            method_info,
            field_info,
            property_info,
            event_info,
            constructor_info,
            activator,
            app_domain,
            object_handle,
            expression,
            reflection_extensions,
            dynamic_dependency_attribute,
            dynamic_dependency_ctors,
            preserve_dependency_attribute,
            preserve_dependency_ctors,
        })
    }
}

struct Builder<'u> {
    universe: &'u mut Universe,
    asm: AssemblyId,
}

impl Builder<'_> {
    fn class(&mut self, namespace: &str, name: &str, base: Option<&TypeSig>) -> Result<TypeId> {
        let mut def = TypeDef::new(namespace, name).with_flags(TypeAttributes::BEFORE_FIELD_INIT);
        def.base = base.cloned();
        self.universe.add_type(self.asm, def)
    }

    fn method(&mut self, owner: TypeId, def: MethodDef) -> Result<MethodId> {
        self.universe.add_method(owner, def)
    }
}

fn static_method(name: &str) -> MethodDef {
    MethodDef::new(name).with_modifiers(MethodModifiers::STATIC)
}

fn virtual_new(name: &str) -> MethodDef {
    MethodDef::new(name).with_modifiers(MethodModifiers::VIRTUAL | MethodModifiers::NEW_SLOT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_registers_well_known_types() -> Result<()> {
        let mut universe = Universe::new();
        let core = CoreLibrary::install(&mut universe)?;

        assert_eq!(universe.find_assembly(CORELIB_NAME), Some(core.assembly));
        assert_eq!(universe.find_type("System.Object"), Some(core.object));
        assert_eq!(
            universe.find_type("System.Reflection.BindingFlags"),
            Some(core.binding_flags)
        );
        assert!(universe.derives_from(core.not_supported_exception, core.exception));
        assert_eq!(
            universe.method_full_name(core.get_type_from_handle),
            "System.Type::GetTypeFromHandle(System.RuntimeTypeHandle)"
        );
        assert_eq!(universe.methods_named(core.type_type, "GetMethod").count(), 2);
        assert!(CoreLibrary::install(&mut universe).is_err());
        Ok(())
    }
}
