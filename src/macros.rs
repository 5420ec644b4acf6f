#![allow(unused_macros)]

/// Helper macro for declaring strongly-typed arena identifiers
///
/// Every member kind of the model gets its own newtype over `u32`, so a `MethodId` can never be
/// used to index the field table. The second argument is the prefix used by `Display`.
///
/// ```rust, ignore
///  define_id!(
///      /// Identifies a method definition
///      MethodId, "m"
///  );
///  let id = MethodId::new(3);
///  assert_eq!(id.to_string(), "m3");
/// ```
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Creates an identifier from a raw arena index.
            #[must_use]
            #[inline]
            pub const fn new(index: u32) -> Self {
                $name(index)
            }

            /// Returns the raw arena index of this identifier.
            #[must_use]
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }

        impl From<$name> for usize {
            #[inline]
            fn from(id: $name) -> Self {
                id.0 as usize
            }
        }
    };
}

/// Helper macro for pushing a value into an arena and returning its typed identifier
///
/// ```rust, ignore
///  let id: TypeId = arena_push!(self.types, def, TypeId);
/// ```
macro_rules! arena_push {
    ($arena:expr, $value:expr, $id:ident) => {{
        let index = u32::try_from($arena.len())
            .map_err(|_| crate::Error::Error(format!("{} arena exhausted", stringify!($id))))?;
        $arena.push($value);
        $id::new(index)
    }};
}
