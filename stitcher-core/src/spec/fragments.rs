use crate::spec::selection::Selection;
use serde::Deserialize;
use std::collections::HashMap;

/// The named fragments of a request, keyed by fragment name.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct Fragments {
    map: HashMap<String, Fragment>,
}

impl Fragments {
    pub fn new(map: HashMap<String, Fragment>) -> Self {
        Fragments { map }
    }

    pub(crate) fn get(&self, key: impl AsRef<str>) -> Option<&Fragment> {
        self.map.get(key.as_ref())
    }
}

impl FromIterator<(String, Fragment)> for Fragments {
    fn from_iter<I: IntoIterator<Item = (String, Fragment)>>(iter: I) -> Self {
        Fragments {
            map: iter.into_iter().collect(),
        }
    }
}

/// A named fragment definition.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    pub type_condition: String,
    pub selection_set: Vec<Selection>,
}
