//! Linker configuration
//!
//! [`LinkerConfig`] decides which assemblies are roots, what happens to each assembly, and which
//! optimizations the mark step may apply. Configurations are plain data: they can be built in
//! code with the presets and builder methods, or read from JSON.

use std::collections::HashMap;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::{linker::AssemblyAction, Result};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    /// Optimizations that let the mark step keep less than a conservative analysis would
    pub struct Optimizations: u32 {
        /// Keep overrides of non-abstract methods only on instantiated types
        const OVERRIDE_REMOVAL = 0x01;
        /// Keep interface implementations only when the interface itself is needed
        const UNUSED_INTERFACES = 0x02;
        /// Replace bodies of instance methods on never-instantiated types with a throw
        const UNREACHABLE_BODIES = 0x04;
    }
}

impl Default for Optimizations {
    fn default() -> Self {
        Optimizations::all()
    }
}

/// Which members of a root assembly are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RootVisibility {
    /// Every member
    All,
    /// Members visible outside the assembly: public and protected, in visible types
    VisibleMembers,
    /// Only the managed entry point
    EntryPoint,
}

/// An assembly whose members are roots of the search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootAssembly {
    /// Simple assembly name
    pub name: String,
    /// Which members are roots
    pub visibility: RootVisibility,
}

/// Configuration for a link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
#[serde(default)]
pub struct LinkerConfig {
    /// Action of assemblies not listed in `assembly_actions`
    pub default_action: AssemblyAction,

    /// Per-assembly actions, by simple name
    pub assembly_actions: HashMap<String, AssemblyAction>,

    /// Root assemblies, processed in order
    pub root_assemblies: Vec<RootAssembly>,

    /// Treat unresolved references as dead ends instead of failing
    pub ignore_unresolved: bool,

    /// Enabled optimizations; they only ever apply to assemblies with the `Link` action
    pub optimizations: Optimizations,

    /// Keep custom attributes only when their attribute type is otherwise used
    pub keep_used_attribute_types_only: bool,

    /// Analyse reflection call sites
    pub scan_reflection: bool,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            default_action: AssemblyAction::Link,
            assembly_actions: HashMap::new(),
            root_assemblies: Vec::new(),
            ignore_unresolved: false,
            optimizations: Optimizations::default(),
            keep_used_attribute_types_only: false,
            scan_reflection: true,
        }
    }
}

impl LinkerConfig {
    /// Creates a configuration that keeps as much as possible
    ///
    /// Every assembly is copied unless configured otherwise, no optimization is enabled and
    /// unresolved references are ignored.
    #[must_use]
    pub fn conservative() -> Self {
        Self {
            default_action: AssemblyAction::Copy,
            ignore_unresolved: true,
            optimizations: Optimizations::empty(),
            ..Self::default()
        }
    }

    /// Creates a configuration that trims as much as possible
    ///
    /// Every assembly is linked, all optimizations are enabled and attributes are kept only
    /// for used attribute types.
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            default_action: AssemblyAction::Link,
            optimizations: Optimizations::all(),
            keep_used_attribute_types_only: true,
            ..Self::default()
        }
    }

    /// Adds a root assembly.
    #[must_use]
    pub fn with_root(mut self, name: &str, visibility: RootVisibility) -> Self {
        self.root_assemblies.push(RootAssembly {
            name: name.to_string(),
            visibility,
        });
        self
    }

    /// Sets the action of an assembly.
    #[must_use]
    pub fn with_action(mut self, name: &str, action: AssemblyAction) -> Self {
        self.assembly_actions.insert(name.to_string(), action);
        self
    }

    /// Replaces the optimization set.
    #[must_use]
    pub fn with_optimizations(mut self, optimizations: Optimizations) -> Self {
        self.optimizations = optimizations;
        self
    }

    /// Switches unresolved references to dead ends.
    #[must_use]
    pub fn ignoring_unresolved(mut self) -> Self {
        self.ignore_unresolved = true;
        self
    }

    /// The action for an assembly named `name`.
    #[must_use]
    pub fn action_for(&self, name: &str) -> AssemblyAction {
        self.assembly_actions
            .get(name)
            .copied()
            .unwrap_or(self.default_action)
    }

    /// Returns `true` if `optimization` applies to an assembly with `action`.
    #[must_use]
    pub fn is_optimization_enabled(&self, optimization: Optimizations, action: AssemblyAction) -> bool {
        action == AssemblyAction::Link && self.optimizations.contains(optimization)
    }

    /// Reads a configuration from JSON. Missing fields take their default.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Serialization`] if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Writes the configuration as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LinkerConfig::default();
        assert_eq!(config.default_action, AssemblyAction::Link);
        assert!(!config.ignore_unresolved);
        assert!(config.scan_reflection);
        assert!(config.optimizations.contains(Optimizations::OVERRIDE_REMOVAL));
    }

    #[test]
    fn test_presets() {
        let conservative = LinkerConfig::conservative();
        assert_eq!(conservative.default_action, AssemblyAction::Copy);
        assert!(conservative.optimizations.is_empty());

        let aggressive = LinkerConfig::aggressive();
        assert!(aggressive.keep_used_attribute_types_only);
        assert_eq!(aggressive.optimizations, Optimizations::all());
    }

    #[test]
    fn test_optimizations_only_apply_to_linked_assemblies() {
        let config = LinkerConfig::default();
        assert!(config.is_optimization_enabled(Optimizations::OVERRIDE_REMOVAL, AssemblyAction::Link));
        assert!(!config.is_optimization_enabled(Optimizations::OVERRIDE_REMOVAL, AssemblyAction::Copy));

        let off = config.with_optimizations(Optimizations::UNUSED_INTERFACES);
        assert!(!off.is_optimization_enabled(Optimizations::OVERRIDE_REMOVAL, AssemblyAction::Link));
    }

    #[test]
    fn test_json_round_trip_with_defaults() -> Result<()> {
        let config = LinkerConfig::from_json(
            r#"{ "assembly_actions": { "Lib": "Copy" }, "root_assemblies": [ { "name": "App", "visibility": "EntryPoint" } ] }"#,
        )?;
        assert_eq!(config.action_for("Lib"), AssemblyAction::Copy);
        assert_eq!(config.action_for("Other"), AssemblyAction::Link);
        assert_eq!(config.root_assemblies[0].visibility, RootVisibility::EntryPoint);
        assert!(config.scan_reflection);

        assert_eq!(LinkerConfig::from_json(&config.to_json()?)?, config);
        assert!(LinkerConfig::from_json("{ not json").is_err());
        Ok(())
    }
}
