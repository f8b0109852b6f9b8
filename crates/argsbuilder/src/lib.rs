//! Submission argument composition for AppWrapper training jobs.
//!
//! Options land either directly on [`SubmitAppWrapperJobArgs`] or, when their
//! value is only known after parsing (repeated `k=v` flags, durations), in an
//! [`ArgValues`] bag. The composite builder in [`appwrapper`] then runs the
//! sub-builders in order, reconciles dependent fields, validates and derives
//! annotations and env.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use awjob_core::{Result, SubmitAppWrapperJobArgs};

pub mod appwrapper;
pub mod check;
pub mod common;
pub mod flags;
pub mod job;
pub mod sync_code;
pub mod tensorboard;

pub use appwrapper::SubmitAppWrapperJobArgsBuilder;
pub use job::{AppWrapperJobBuilder, Job};

/// A late-bound option value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Strings(Vec<String>),
    Duration(chrono::Duration),
    Map(BTreeMap<String, String>),
}

impl From<Vec<String>> for ArgValue {
    fn from(v: Vec<String>) -> Self { Self::Strings(v) }
}

impl From<chrono::Duration> for ArgValue {
    fn from(d: chrono::Duration) -> Self { Self::Duration(d) }
}

impl From<BTreeMap<String, String>> for ArgValue {
    fn from(m: BTreeMap<String, String>) -> Self { Self::Map(m) }
}

/// Flag name -> late-bound value, shared by every stage of a build.
#[derive(Debug, Clone, Default)]
pub struct ArgValues(BTreeMap<String, ArgValue>);

impl ArgValues {
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ArgValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ArgValue> { self.0.get(key) }

    pub fn contains(&self, key: &str) -> bool { self.0.contains_key(key) }

    /// Values of a repeated string option; empty when absent or of another kind.
    pub fn strings(&self, key: &str) -> &[String] {
        match self.0.get(key) {
            Some(ArgValue::Strings(v)) => v,
            _ => &[],
        }
    }

    pub fn duration(&self, key: &str) -> Option<chrono::Duration> {
        match self.0.get(key) {
            Some(ArgValue::Duration(d)) => Some(*d),
            _ => None,
        }
    }

    pub fn map(&self, key: &str) -> Option<&BTreeMap<String, String>> {
        match self.0.get(key) {
            Some(ArgValue::Map(m)) => Some(m),
            _ => None,
        }
    }
}

impl IntoIterator for ArgValues {
    type Item = (String, ArgValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, ArgValue>;
    fn into_iter(self) -> Self::IntoIter { self.0.into_iter() }
}

/// One stage of a sub-builder.
pub type Stage = fn(&mut SubmitAppWrapperJobArgs, &ArgValues) -> Result<()>;

/// A sub-builder owns one fragment of the submission args and contributes a pre-build
/// and a build stage.
#[derive(Clone, Copy)]
pub struct SubBuilder {
    pub name: &'static str,
    pub pre_build: Stage,
    pub build: Stage,
}

impl std::fmt::Debug for SubBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubBuilder").field("name", &self.name).finish()
    }
}

/// Split `k<sep>v` entries into a map; entries without the separator are skipped.
pub fn transform_slice_to_map(entries: &[String], sep: char) -> BTreeMap<String, String> {
    entries
        .iter()
        .filter_map(|e| e.split_once(sep))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
