use crate::{
    linker::{
        reflection::ReflectionApi, CallSite, ReflectionData, ReflectionDataKind,
    },
    model::{EventId, FieldId, MethodHandle, MethodId, PropertyId, TypeId},
};

/// A member a recognized reflection call site accesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReflectionTarget {
    /// A type looked up by name or constructed
    Type(TypeId),
    /// A method looked up by name
    Method(MethodId),
    /// A field looked up by name
    Field(FieldId),
    /// A property looked up by name; its accessors come with it
    Property(PropertyId),
    /// An event looked up by name; its accessors come with it
    Event(EventId),
    /// A constructor the call site invokes to create an instance
    DefaultConstructor(MethodId),
}

/// The result of analysing one reflection call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternResult {
    /// Every argument was understood; these members are accessed
    Recognized(Vec<ReflectionTarget>),
    /// Some argument could not be determined
    Unrecognized {
        /// What reached the call site
        data: ReflectionData,
        /// Human readable explanation
        reason: String,
    },
}

/// One reflection call site under analysis.
///
/// The site is consumed by exactly one of [`ReflectionCallSite::recognized`] or
/// [`ReflectionCallSite::unrecognized`], so every analysed call site ends with exactly one
/// [`PatternOutcome`].
#[derive(Debug)]
pub struct ReflectionCallSite {
    caller: MethodId,
    callee: MethodId,
    handle: MethodHandle,
    api: ReflectionApi,
    offset: u32,
}

impl ReflectionCallSite {
    pub(crate) fn new(
        caller: MethodId,
        callee: MethodId,
        handle: MethodHandle,
        api: ReflectionApi,
        offset: u32,
    ) -> Self {
        ReflectionCallSite {
            caller,
            callee,
            handle,
            api,
            offset,
        }
    }

    /// The method containing the call.
    #[must_use]
    pub fn caller(&self) -> MethodId {
        self.caller
    }

    /// The resolved reflection API.
    #[must_use]
    pub fn callee(&self) -> MethodId {
        self.callee
    }

    /// The call operand as written, including generic instantiation.
    #[must_use]
    pub fn handle(&self) -> MethodHandle {
        self.handle
    }

    /// Which API this is.
    #[must_use]
    pub fn api(&self) -> ReflectionApi {
        self.api
    }

    /// Closes the site as understood.
    #[must_use]
    pub fn recognized(self, targets: Vec<ReflectionTarget>) -> PatternOutcome {
        self.finish(PatternResult::Recognized(targets))
    }

    /// Closes the site as not understood.
    #[must_use]
    pub fn unrecognized(
        self,
        kind: ReflectionDataKind,
        reason: impl Into<String>,
        value: Option<String>,
    ) -> PatternOutcome {
        self.finish(PatternResult::Unrecognized {
            data: ReflectionData { kind, value },
            reason: reason.into(),
        })
    }

    fn finish(self, result: PatternResult) -> PatternOutcome {
        PatternOutcome {
            callsite: CallSite {
                caller: self.caller,
                callee: self.callee,
            },
            api: self.api,
            offset: self.offset,
            result,
        }
    }
}

/// The closed form of a [`ReflectionCallSite`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternOutcome {
    callsite: CallSite,
    api: ReflectionApi,
    offset: u32,
    result: PatternResult,
}

impl PatternOutcome {
    /// Caller and callee.
    #[must_use]
    pub fn callsite(&self) -> CallSite {
        self.callsite
    }

    /// Which API was called.
    #[must_use]
    pub fn api(&self) -> ReflectionApi {
        self.api
    }

    /// IL offset of the call.
    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// What the analysis concluded.
    #[must_use]
    pub fn result(&self) -> &PatternResult {
        &self.result
    }

    /// Returns `true` if the site was understood.
    #[must_use]
    pub fn is_recognized(&self) -> bool {
        matches!(self.result, PatternResult::Recognized(_))
    }
}
