//! Attribute flag sets of the member model.
//!
//! Values follow ECMA-335 §II.23.1 so that a model populated from real metadata can copy the
//! raw bits straight in with `from_bits_truncate`. Accessibility is a 3-bit enumeration inside
//! the raw flags, not a set of independent bits, so it is modelled separately as
//! [`Accessibility`].

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Member and nested-type accessibility.
///
/// Top-level types only distinguish [`Accessibility::Public`] and [`Accessibility::Assembly`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum Accessibility {
    /// Accessible only by the declaring type
    Private,
    /// Accessible by sub-types only in this assembly
    FamilyAndAssembly,
    /// Accessible by anyone in the assembly
    Assembly,
    /// Accessible only by the type and sub-types
    Family,
    /// Accessible by sub-types anywhere, plus anyone in the assembly
    FamilyOrAssembly,
    /// Accessible by anyone who has visibility to this scope
    Public,
}

impl Accessibility {
    /// Returns `true` if code outside the declaring assembly can reach the member.
    ///
    /// Family access counts: a derived type in another assembly can see protected members.
    #[must_use]
    pub fn is_externally_visible(self) -> bool {
        matches!(
            self,
            Accessibility::Public | Accessibility::Family | Accessibility::FamilyOrAssembly
        )
    }

    /// Returns `true` for members a reflection lookup with `BindingFlags.Public` would find.
    #[must_use]
    pub fn is_public(self) -> bool {
        self == Accessibility::Public
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    /// Type definition flags, excluding visibility
    pub struct TypeAttributes: u32 {
        /// Type is an interface
        const INTERFACE = 0x0000_0020;
        /// Type is abstract
        const ABSTRACT = 0x0000_0080;
        /// Type cannot be derived from
        const SEALED = 0x0000_0100;
        /// Type name is special
        const SPECIAL_NAME = 0x0000_0400;
        /// Type is imported (COM)
        const IMPORT = 0x0000_1000;
        /// Type is serializable
        const SERIALIZABLE = 0x0000_2000;
        /// Static constructor runs lazily, on first static field access
        const BEFORE_FIELD_INIT = 0x0010_0000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    /// Method modifier flags, excluding accessibility
    pub struct MethodModifiers: u32 {
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Method cannot be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name+sig, else just by name
        const HIDE_BY_SIG = 0x0080;
        /// Method always gets a new slot in the vtable
        const NEW_SLOT = 0x0100;
        /// Method does not provide an implementation
        const ABSTRACT = 0x0400;
        /// Method is special
        const SPECIAL_NAME = 0x0800;
        /// Implementation is forwarded through PInvoke
        const PINVOKE_IMPL = 0x2000;
        /// CLI provides 'special' behavior, depending upon the name of the method
        const RT_SPECIAL_NAME = 0x1000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    /// Field definition flags, excluding accessibility
    pub struct FieldAttributes: u32 {
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Field can only be initialized, not written to after init
        const INIT_ONLY = 0x0020;
        /// Value is compile time constant
        const LITERAL = 0x0040;
        /// Field is special
        const SPECIAL_NAME = 0x0200;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    /// `System.Reflection.BindingFlags` as passed to reflection lookups
    pub struct BindingFlags: u32 {
        /// Case-insensitive name comparison
        const IGNORE_CASE = 0x0001;
        /// Only members declared on the type itself
        const DECLARED_ONLY = 0x0002;
        /// Instance members
        const INSTANCE = 0x0004;
        /// Static members
        const STATIC = 0x0008;
        /// Public members
        const PUBLIC = 0x0010;
        /// Non-public members
        const NON_PUBLIC = 0x0020;
        /// Public static members up the hierarchy
        const FLATTEN_HIERARCHY = 0x0040;
    }
}

impl BindingFlags {
    /// The implicit flags of the single-argument reflection overloads such as `GetMethod(string)`.
    pub const DEFAULT_LOOKUP: BindingFlags = BindingFlags::PUBLIC
        .union(BindingFlags::INSTANCE)
        .union(BindingFlags::STATIC);

    /// Returns `true` if a member with the given shape passes this filter.
    ///
    /// A filter that names neither visibility (or neither storage class) places no restriction
    /// on that axis. At run time such a filter matches nothing; admitting everything instead
    /// keeps the marked set a superset of what the lookup can return.
    #[must_use]
    pub fn admits(self, public: bool, is_static: bool) -> bool {
        let visibility_ok = if self.intersects(BindingFlags::PUBLIC | BindingFlags::NON_PUBLIC) {
            (public && self.contains(BindingFlags::PUBLIC))
                || (!public && self.contains(BindingFlags::NON_PUBLIC))
        } else {
            true
        };
        let storage_ok = if self.intersects(BindingFlags::STATIC | BindingFlags::INSTANCE) {
            (is_static && self.contains(BindingFlags::STATIC))
                || (!is_static && self.contains(BindingFlags::INSTANCE))
        } else {
            true
        };
        visibility_ok && storage_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessibility_visibility() {
        assert!(Accessibility::Public.is_externally_visible());
        assert!(Accessibility::Family.is_externally_visible());
        assert!(Accessibility::FamilyOrAssembly.is_externally_visible());
        assert!(!Accessibility::FamilyAndAssembly.is_externally_visible());
        assert!(!Accessibility::Private.is_externally_visible());
        assert!(!Accessibility::Assembly.is_externally_visible());
    }

    #[test]
    fn test_binding_flags_filter() {
        let flags = BindingFlags::NON_PUBLIC | BindingFlags::INSTANCE;
        assert!(flags.admits(false, false));
        assert!(!flags.admits(true, false));
        assert!(!flags.admits(false, true));

        assert!(BindingFlags::DEFAULT_LOOKUP.admits(true, true));
        assert!(!BindingFlags::DEFAULT_LOOKUP.admits(false, false));
        assert!(BindingFlags::empty().admits(false, true));
    }

    #[test]
    fn test_binding_flags_without_visibility_admit_both() {
        let flags = BindingFlags::STATIC | BindingFlags::IGNORE_CASE;
        assert!(flags.admits(true, true));
        assert!(flags.admits(false, true));
        assert!(!flags.admits(false, false));
    }

    #[test]
    fn test_raw_bits() {
        let mods = MethodModifiers::from_bits_truncate(0x0040 | 0x0100 | 0x0006);
        assert!(mods.contains(MethodModifiers::VIRTUAL | MethodModifiers::NEW_SLOT));
        assert_eq!(BindingFlags::from_bits_truncate(52), BindingFlags::PUBLIC | BindingFlags::NON_PUBLIC | BindingFlags::INSTANCE);
    }
}
