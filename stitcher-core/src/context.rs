use crate::delegate::merge_fields::PlanCache;
use crate::json_ext::Object;

/// Per-request execution context.
///
/// Carries the request's variable values, used to evaluate `@skip`,
/// `@include` and `@defer(if:)` conditions, and the cache tables that
/// memoize proxiability checks and delegation plans. The caches are scoped
/// to one top-level request so they do not leak across unrelated requests.
#[derive(Debug, Default)]
pub struct Context {
    /// The request's variable values.
    pub variables: Object,

    pub(crate) caches: PlanCache,
}

impl Context {
    pub fn new(variables: Object) -> Self {
        Context {
            variables,
            caches: Default::default(),
        }
    }
}
