//! Section parser for the legacy line-oriented text formats
//!
//! Files are sequences of `[Name]` headers, each followed by `Tag=Value`
//! lines and, in some sections, raw data rows without a `=`.

use std::str::FromStr;

use memchr::memchr;

use crate::error::{Result, SectionError};

/// One `[Name]` section and its contents
#[derive(Debug, Clone, Default)]
pub struct Section {
    pub name: String,
    /// 1-based line of the `[Name]` header
    pub line: usize,
    entries: Vec<Entry>,
    rows: Vec<(usize, String)>,
}

#[derive(Debug, Clone)]
struct Entry {
    tag: String,
    value: String,
    line: usize,
}

impl Section {
    /// Returns the value of the first entry named `tag`
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<&str> {
        self.entry(tag).map(|e| e.value.as_str())
    }

    fn entry(&self, tag: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.tag == tag)
    }

    /// Returns the value of `tag` or a [`SectionError::MissingTag`]
    pub fn require(&self, tag: &str) -> Result<&str> {
        self.get(tag).ok_or_else(|| {
            SectionError::MissingTag {
                section: self.name.clone(),
                tag: tag.to_string(),
                line: self.line,
            }
            .into()
        })
    }

    /// Parses the value of `tag`
    pub fn parse<T: FromStr>(&self, tag: &str) -> Result<T> {
        let value = self.require(tag)?;
        self.parse_value(tag, value, self.line_of(tag))
    }

    /// Parses the value of `tag` if present
    pub fn parse_opt<T: FromStr>(&self, tag: &str) -> Result<Option<T>> {
        match self.entry(tag) {
            Some(e) => self.parse_value(tag, &e.value, e.line).map(Some),
            None => Ok(None),
        }
    }

    /// Parses a single field of a tag or data row, reporting failures against this section
    pub fn parse_value<T: FromStr>(&self, tag: &str, value: &str, line: usize) -> Result<T> {
        value.trim().parse().map_err(|_| {
            SectionError::InvalidValue {
                section: self.name.clone(),
                tag: tag.to_string(),
                value: value.to_string(),
                line,
            }
            .into()
        })
    }

    /// Line of the first entry named `tag`, or of the section header
    #[must_use]
    pub fn line_of(&self, tag: &str) -> usize {
        self.entry(tag).map_or(self.line, |e| e.line)
    }

    /// Fails with [`SectionError::CountMismatch`] unless `found == declared`
    ///
    /// `tag` names the field the declared count came from.
    pub fn check_count(&self, tag: &'static str, declared: usize, found: usize) -> Result<()> {
        if declared == found {
            return Ok(());
        }
        Err(SectionError::CountMismatch {
            section: self.name.clone(),
            tag,
            declared,
            found,
            line: self.line_of(tag),
        }
        .into())
    }

    /// All entries in file order as `(tag, value)`
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|e| (e.tag.as_str(), e.value.as_str()))
    }

    /// All entries in file order as `(tag, value, line)`
    pub fn entries_with_lines(&self) -> impl Iterator<Item = (&str, &str, usize)> {
        self.entries
            .iter()
            .map(|e| (e.tag.as_str(), e.value.as_str(), e.line))
    }

    /// Data rows (lines without a `=`) as `(line, text)`
    #[must_use]
    pub fn rows(&self) -> &[(usize, String)] {
        &self.rows
    }
}

/// A parsed text document: its sections in file order
#[derive(Debug, Clone, Default)]
pub struct Document {
    sections: Vec<Section>,
}

impl Document {
    /// Splits `bytes` into sections
    ///
    /// Blank lines are skipped and `\r\n` endings are accepted. Content
    /// before the first header is an error since nothing can own it.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut sections: Vec<Section> = Vec::new();
        let mut start = 0;
        let mut line_no = 0;
        while start < bytes.len() {
            let end = memchr(b'\n', &bytes[start..]).map_or(bytes.len(), |i| start + i);
            line_no += 1;
            let raw = &bytes[start..end];
            start = end + 1;

            let line = String::from_utf8_lossy(raw);
            let line = line.trim_end_matches(|c| c == '\r' || c == '\0');
            if line.trim().is_empty() {
                continue;
            }

            if line.starts_with('[') {
                let Some(close) = line.find(']') else {
                    return Err(SectionError::UnterminatedHeader { line: line_no }.into());
                };
                sections.push(Section {
                    name: line[1..close].trim().to_string(),
                    line: line_no,
                    ..Default::default()
                });
                continue;
            }

            let Some(section) = sections.last_mut() else {
                return Err(SectionError::MissingHeader {
                    expected: "any",
                    line: line_no,
                }
                .into());
            };
            match memchr(b'=', line.as_bytes()) {
                Some(eq) => section.entries.push(Entry {
                    tag: line[..eq].trim().to_string(),
                    value: line[eq + 1..].to_string(),
                    line: line_no,
                }),
                None => section.rows.push((line_no, line.to_string())),
            }
        }
        Ok(Self { sections })
    }

    /// Sections in file order
    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Returns the first section named `name`
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Returns the first section named `name` or a [`SectionError::MissingSection`]
    pub fn require(&self, name: &str) -> Result<&Section> {
        self.section(name).ok_or_else(|| {
            SectionError::MissingSection {
                section: name.to_string(),
            }
            .into()
        })
    }

    /// Checks that the document opens with `[expected]`
    pub fn expect_first(&self, expected: &'static str) -> Result<&Section> {
        match self.sections.first() {
            Some(section) if section.name == expected => Ok(section),
            Some(section) => Err(SectionError::MissingHeader {
                expected,
                line: section.line,
            }
            .into()),
            None => Err(SectionError::MissingHeader { expected, line: 1 }.into()),
        }
    }
}

/// Splits a tab-delimited `CellHeader` and locates the named columns
#[derive(Debug, Clone)]
pub struct CellHeader {
    columns: Vec<String>,
}

impl CellHeader {
    #[must_use]
    pub fn new(value: &str) -> Self {
        Self {
            columns: value.split('\t').map(|c| c.trim().to_string()).collect(),
        }
    }

    /// Index of the first column whose name is one of `names`
    #[must_use]
    pub fn index_of(&self, names: &[&str]) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| names.iter().any(|n| c.eq_ignore_ascii_case(n)))
    }
}
