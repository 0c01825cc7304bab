use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Queue identifier handed out by the assignment endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueUrl(String);

impl QueueUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for QueueUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Approximate queue counters, read once per poll
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueDepth {
    pub visible: u64,
    pub invisible: u64,
    pub delayed: u64,
}

impl QueueDepth {
    pub fn total(&self) -> u64 {
        self.visible
            .saturating_add(self.invisible)
            .saturating_add(self.delayed)
    }
}

/// One word of the scattered phrase, keyed by its raw `order_no` attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub order_key: String,
    pub word: String,
}

/// Fragments captured so far, keyed by raw order key.
///
/// Insertion is last-write-wins. Keys stay in their string form until
/// reassembly so the snapshot reflects exactly what the queue delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FragmentCollection(BTreeMap<String, String>);

impl FragmentCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fragment, returning the word it replaced (if any)
    pub fn insert(&mut self, fragment: Fragment) -> Option<String> {
        self.0.insert(fragment.order_key, fragment.word)
    }

    pub fn get(&self, order_key: &str) -> Option<&str> {
        self.0.get(order_key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for FragmentCollection
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut collection = Self::new();
        for (order_key, word) in iter {
            collection.insert(Fragment {
                order_key: order_key.into(),
                word: word.into(),
            });
        }
        collection
    }
}

/// Why the drain loop decided the queue was finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainOutcome {
    /// Empty receive and all depth counters at zero
    QueueEmpty,
    /// Too many consecutive empty receives while counters stayed nonzero
    AssumedComplete,
    /// The configured total poll bound was reached
    PollLimitReached,
}

impl fmt::Display for DrainOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DrainOutcome::QueueEmpty => "queue empty",
            DrainOutcome::AssumedComplete => "assumed complete",
            DrainOutcome::PollLimitReached => "poll limit reached",
        };
        f.write_str(s)
    }
}

/// The final payload sent to the submission queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub requester_id: String,
    pub message: String,
    pub origin_tag: String,
}
