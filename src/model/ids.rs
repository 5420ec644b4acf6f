//! Typed arena identifiers for every member kind of the model.
//!
//! Identity in the model is a dense index into the corresponding [`Universe`](super::Universe)
//! table. These ids are what the annotation store keys its bit sets on and what the provenance
//! graph canonicalizes nodes by.

define_id!(
    /// Identifies an assembly of the universe
    AssemblyId, "a"
);
define_id!(
    /// Identifies a type definition
    TypeId, "t"
);
define_id!(
    /// Identifies a method definition
    MethodId, "m"
);
define_id!(
    /// Identifies a field definition
    FieldId, "f"
);
define_id!(
    /// Identifies a property definition
    PropertyId, "p"
);
define_id!(
    /// Identifies an event definition
    EventId, "e"
);
define_id!(
    /// Identifies a custom attribute instance
    AttributeId, "ca"
);
define_id!(
    /// Identifies an interface implementation row, the "`T : I`" declaration itself
    InterfaceImplId, "ii"
);
define_id!(
    /// Identifies a member reference that is not itself a definition
    MemberRefId, "mr"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_formatting() {
        let m = MethodId::new(12);
        assert_eq!(m.to_string(), "m12");
        assert_eq!(format!("{m:?}"), "MethodId(12)");
        assert_eq!(m.index(), 12);
        assert_eq!(InterfaceImplId::new(2).to_string(), "ii2");
    }
}
