// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]

//! # reachscope
//!
//! Whole-program reachability analysis for .NET assemblies: the mark phase of an IL linker.
//!
//! Starting from a set of roots (assemblies, entry points, explicitly named members),
//! `reachscope` computes the transitive closure of everything the program may need at runtime.
//! It follows calls, field accesses, type references, custom attributes, virtual dispatch and
//! interface implementations, and recognizes common reflection patterns whose targets are known
//! from literal arguments. Every mark is justified by a typed dependency edge, so the
//! provenance graph can explain why any member was kept, and why code reached an
//! unanalyzable reflection call.
//!
//! ## Features
//!
//! - **🎯 Precise override gating** - Overrides of non-abstract base methods are kept only for
//!   instantiated types
//! - **🧩 Interface carve-outs** - Interface implementations on types that are never
//!   instantiated are not kept alive by dispatch alone
//! - **🔍 Reflection pattern detection** - `GetMethod("Foo")`, `Activator.CreateInstance`,
//!   expression trees and friends are resolved when their arguments are constants
//! - **🧭 Provenance** - Deterministic shortest dependency paths from roots to any member
//! - **⚙️ Per-assembly actions** - `Copy`, `Link`, `CopyUsed` and friends control what is kept
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use reachscope::prelude::*;
//!
//! let mut universe = Universe::new();
//! let core = CoreLibrary::install(&mut universe)?;
//! let app = universe.add_assembly("App")?;
//! let program = universe.add_type(app, TypeDef::new("App", "Program").with_base(core.object))?;
//! let main = universe.add_method(
//!     program,
//!     MethodDef::new("Main").with_modifiers(MethodModifiers::STATIC),
//! )?;
//! universe.set_entry_point(app, main)?;
//!
//! let config = LinkerConfig::default()
//!     .with_root("App", RootVisibility::EntryPoint)
//!     .with_action(CORELIB_NAME, AssemblyAction::Link);
//! let mut context = LinkContext::new(universe, config)?;
//! context.mark()?;
//!
//! assert!(context.annotations().is_marked(main));
//! println!("{}", context.provenance_report().to_json()?);
//! # Ok::<(), reachscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`model`] - The member model: a typed arena of assemblies, types and members with
//!   resolved IL bodies
//! - [`linker`] - The mark step, its annotation store, the type/override map, the reflection
//!   detector and the provenance graph
//! - [`utils`] - Directed graph and bit set primitives
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`]. Problems in the analysed program that do not
//! stop the analysis, like unrecognized reflection or malformed dependency attributes, are
//! collected as [`linker::Diagnostics`] instead.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types.
///
/// ```rust,ignore
/// use reachscope::prelude::*;
/// ```
pub mod prelude;

/// The mark phase and everything it maintains.
///
/// See [`linker::LinkContext`] for the entry point.
pub mod linker;

/// The analysed member model.
pub mod model;

/// Graph and set primitives shared by the linker.
pub mod utils;

/// `reachscope` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `reachscope` Error type
///
/// See [`error::Error`] for the variants.
pub use error::{Error, ReferenceKind};
