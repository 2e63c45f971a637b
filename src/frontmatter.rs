//! Flat frontmatter parsing for task notes.
//!
//! Task notes open with a `---` fenced block of `key: value` lines. The
//! engine only ever treats frontmatter as a flat string map; typed accessors
//! live here so each caller parses a field exactly once and malformed values
//! read as absent.

use std::collections::BTreeMap;

use chrono::NaiveDate;

/// Flat key/value frontmatter of a task note
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frontmatter {
    fields: BTreeMap<String, String>,
}

impl Frontmatter {
    /// Extract frontmatter from note content.
    ///
    /// Returns the parsed map and the byte offset where the body starts.
    /// Content without a frontmatter fence yields an empty map and offset 0.
    pub fn parse(content: &str) -> (Frontmatter, usize) {
        let mut fields = BTreeMap::new();

        let Some(rest) = content.strip_prefix("---") else {
            return (Frontmatter::default(), 0);
        };
        let rest = match rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n')) {
            Some(rest) => rest,
            None => return (Frontmatter::default(), 0),
        };

        let mut offset = content.len() - rest.len();
        for line in rest.split_inclusive('\n') {
            let trimmed = line.trim_end_matches(['\r', '\n']);
            offset += line.len();
            if trimmed.trim() == "---" {
                return (Frontmatter { fields }, offset);
            }
            if let Some((key, value)) = trimmed.split_once(':') {
                let key = key.trim();
                let value = value.trim().trim_matches('"').trim_matches('\'');
                if !key.is_empty() {
                    fields.insert(key.to_string(), value.to_string());
                }
            }
        }

        // Unterminated fence: not frontmatter at all
        (Frontmatter::default(), 0)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Raw string value, empty values read as absent
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.fields.insert(key.to_string(), value.to_string());
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key)?.parse().ok()
    }

    /// A `YYYY-MM-DD` date value
    pub fn get_date(&self, key: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.get(key)?, "%Y-%m-%d").ok()
    }

    /// A comma-separated list of integers (weekday indices)
    pub fn get_u32_list(&self, key: &str) -> Option<Vec<u32>> {
        let raw = self.get(key)?;
        let values: Vec<u32> = raw
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split(',')
            .filter_map(|part| part.trim().parse().ok())
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values)
        }
    }

    /// Re-render the note with this frontmatter and the given body
    pub fn render(&self, body: &str) -> String {
        let mut out = String::from("---\n");
        for (key, value) in &self.fields {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
        out.push_str("---\n");
        out.push_str(body);
        out
    }
}
