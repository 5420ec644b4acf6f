//! JSON report of unsafe reaching facts.
//!
//! Each fact is rendered with one trace per root that reaches the calling method. A trace is a
//! list of `prefix: member` lines read from the caller backwards: one line per dependency hop,
//! labelled with the reason of that hop, then a final line naming the root and its entry reason.
//!
//! ```json
//! {
//!   "unsafe_reaching": [
//!     {
//!       "caller": "App.Caller::Run()",
//!       "callee": "System.Type::GetMethod(System.String)",
//!       "kind": "Unknown",
//!       "value": null,
//!       "traces": [[
//!         "DirectCall: App.Caller::Run()",
//!         "RootAssembly: App.Program::Main()"
//!       ]]
//!     }
//!   ]
//! }
//! ```

use serde::Serialize;

use crate::{
    linker::{provenance::DependencyRecorder, DependencyNode, ReflectionDataKind},
    model::Universe,
    Result,
};

/// A rendered unsafe reaching fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnsafeReachingEntry {
    /// Full name of the calling method
    pub caller: String,
    /// Full name of the reflection API
    pub callee: String,
    /// Classification of the data
    pub kind: ReflectionDataKind,
    /// The literal, when there was one
    pub value: Option<String>,
    /// One trace per root reaching the caller
    pub traces: Vec<Vec<String>>,
}

/// The provenance report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvenanceReport {
    /// Facts in recording order
    pub unsafe_reaching: Vec<UnsafeReachingEntry>,
}

impl ProvenanceReport {
    /// Builds the report from a recorder.
    #[must_use]
    pub fn build(recorder: &DependencyRecorder, universe: &Universe) -> Self {
        let unsafe_reaching = recorder
            .unsafe_reaching()
            .iter()
            .map(|fact| {
                let caller = DependencyNode::Method(fact.callsite.caller);
                let traces = recorder
                    .paths_to(&caller, true)
                    .into_iter()
                    .map(|path| {
                        let root = path.first().map_or(&caller, |edge| &edge.from);
                        let mut lines: Vec<String> = path
                            .iter()
                            .rev()
                            .map(|edge| format!("{}: {}", edge.kind, edge.to.describe(universe)))
                            .collect();
                        lines.push(root_line(recorder, root, universe));
                        lines
                    })
                    .collect();
                UnsafeReachingEntry {
                    caller: universe.method_full_name(fact.callsite.caller),
                    callee: universe.method_full_name(fact.callsite.callee),
                    kind: fact.data.kind,
                    value: fact.data.value.clone(),
                    traces,
                }
            })
            .collect();
        ProvenanceReport { unsafe_reaching }
    }

    /// Serializes the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn root_line(recorder: &DependencyRecorder, root: &DependencyNode, universe: &Universe) -> String {
    match recorder.entry(root) {
        Some(info) => format!("{}: {}", info.kind, root.describe(universe)),
        None => format!("Untracked: {}", root.describe(universe)),
    }
}
