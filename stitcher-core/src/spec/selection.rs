use crate::json_ext::Object;
use serde::Deserialize;

/// A selection set, as supplied by the front-end layer or assembled by the
/// delegation planner. Parsing the query language is not this crate's
/// concern, so selections enter the engine as plain data.
pub type SelectionSet = Vec<Selection>;

/// A single selection within a selection set.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", tag = "kind")]
pub enum Selection {
    /// A field selection.
    Field(Field),

    /// An inline fragment selection.
    InlineFragment(InlineFragment),

    /// A spread of a named fragment.
    FragmentSpread(FragmentSpread),
}

/// The field that is used
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// An optional alias for the field.
    #[serde(default)]
    pub alias: Option<String>,

    /// The name of the field.
    pub name: String,

    /// The selections for the field.
    #[serde(default)]
    pub selections: Option<Vec<Selection>>,

    /// The `@skip(if:)` condition, if any.
    #[serde(default)]
    pub skip_if: Option<Condition>,

    /// The `@include(if:)` condition, if any.
    #[serde(default)]
    pub include_if: Option<Condition>,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Field {
            alias: None,
            name: name.into(),
            selections: None,
            skip_if: None,
            include_if: None,
        }
    }

    /// The key under which this field appears in the response: its alias if
    /// one was given, its name otherwise.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub(crate) fn included(&self, variables: &Object) -> bool {
        included(&self.skip_if, &self.include_if, variables)
    }
}

/// An inline fragment.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineFragment {
    /// The fragment's type condition, if any.
    #[serde(default)]
    pub type_condition: Option<String>,

    /// The selections from the fragment.
    pub selections: Vec<Selection>,

    /// The `@skip(if:)` condition, if any.
    #[serde(default)]
    pub skip_if: Option<Condition>,

    /// The `@include(if:)` condition, if any.
    #[serde(default)]
    pub include_if: Option<Condition>,

    /// The `@defer` directive, if any.
    #[serde(default)]
    pub defer: Option<Defer>,
}

impl InlineFragment {
    pub(crate) fn included(&self, variables: &Object) -> bool {
        included(&self.skip_if, &self.include_if, variables)
    }

    pub(crate) fn condition_matches(&self, type_name: &str) -> bool {
        match &self.type_condition {
            Some(condition) => condition == type_name,
            None => true,
        }
    }
}

/// A spread of a named fragment.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentSpread {
    /// The name of the fragment being spread.
    pub name: String,

    /// The `@skip(if:)` condition, if any.
    #[serde(default)]
    pub skip_if: Option<Condition>,

    /// The `@include(if:)` condition, if any.
    #[serde(default)]
    pub include_if: Option<Condition>,

    /// The `@defer` directive, if any.
    #[serde(default)]
    pub defer: Option<Defer>,
}

impl FragmentSpread {
    pub(crate) fn included(&self, variables: &Object) -> bool {
        included(&self.skip_if, &self.include_if, variables)
    }
}

/// A directive argument that is either a literal boolean or a variable
/// reference.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Literal(bool),
    Variable(String),
}

impl Condition {
    pub(crate) fn eval(&self, variables: &Object) -> Option<bool> {
        match self {
            Condition::Literal(b) => Some(*b),
            Condition::Variable(name) => variables.get(name.as_str()).and_then(|v| v.as_bool()),
        }
    }
}

/// The `@defer` directive carried by a fragment.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Defer {
    /// Deferral is disabled when this evaluates to exactly `false`.
    #[serde(default, rename = "if")]
    pub if_condition: Option<Condition>,

    /// The label propagated onto the patch this fragment produces.
    #[serde(default)]
    pub label: Option<String>,
}

impl Defer {
    pub(crate) fn is_active(&self, variables: &Object) -> bool {
        self.if_condition
            .as_ref()
            .and_then(|condition| condition.eval(variables))
            != Some(false)
    }
}

// @skip excludes only when its condition evaluates to exactly true,
// @include only when its condition evaluates to exactly false.
fn included(
    skip_if: &Option<Condition>,
    include_if: &Option<Condition>,
    variables: &Object,
) -> bool {
    if skip_if.as_ref().and_then(|c| c.eval(variables)) == Some(true) {
        return false;
    }
    include_if.as_ref().and_then(|c| c.eval(variables)) != Some(false)
}
