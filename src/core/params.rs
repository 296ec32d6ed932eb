//! Flat name/value metadata shared by every decoded file

use std::collections::BTreeMap;

/// Ordered string-to-string metadata
///
/// Parameter blocks are merged in file order, so a repeated key keeps the
/// value of its last occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterMap(BTreeMap<String, String>);

impl ParameterMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, replacing any earlier value for `name`
    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        self.0.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for ParameterMap {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParameterMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

/// Splits a free-text blob into `name<delimiter>value` assignments
///
/// Assignments are separated by `;`, line breaks, or whitespace when every
/// whitespace-separated word of a piece is itself an assignment. A value
/// holding free text (`DatHeader=[0..1] chip:CLS=8 Test3.1sq 6`) stays whole.
/// Pieces without the delimiter carry no value and are dropped.
pub fn parse_assignments(blob: &str, delimiter: char) -> Vec<(String, String)> {
    blob.split(|c| c == ';' || c == '\n' || c == '\r')
        .flat_map(|piece| split_words(piece, delimiter))
        .filter_map(|piece| {
            let (name, value) = piece.split_once(delimiter)?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

fn split_words(piece: &str, delimiter: char) -> Vec<&str> {
    let words: Vec<&str> = piece.split_whitespace().collect();
    let all_assignments = words.len() > 1
        && words.iter().all(|word| {
            word.split_once(delimiter)
                .is_some_and(|(name, value)| !name.is_empty() && !value.is_empty())
        });
    if all_assignments {
        words
    } else {
        vec![piece]
    }
}

/// Expands a summary statistic whose value lists sub-statistics
///
/// `("Noise", "X:1.2,Y:3.4")` becomes `[("Noise X", "1.2"), ("Noise Y", "3.4")]`.
/// A value without a comma is returned unchanged, and a comma-separated part
/// without a colon keeps the plain statistic name.
pub fn split_summary_stat(name: &str, value: &str) -> Vec<(String, String)> {
    if !value.contains(',') {
        return vec![(name.to_string(), value.to_string())];
    }
    value
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| match part.split_once(':') {
            Some((sub, v)) => (format!("{name} {}", sub.trim()), v.trim().to_string()),
            None => (name.to_string(), part.trim().to_string()),
        })
        .collect()
}
