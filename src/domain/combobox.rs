//! Searchable selection list with optional create, rename and delete.
//!
//! The combobox owns no data source. Every mutation is reported through the
//! callbacks it was built with; the caller decides what to persist.

use std::ops::Range;

type Predicate = Box<dyn Fn(&str) -> bool>;

/// Label attached to every item matching `predicate`.
pub struct TagRule {
    pub label: String,
    predicate: Predicate,
}

impl TagRule {
    pub fn new(label: &str, predicate: impl Fn(&str) -> bool + 'static) -> Self {
        Self {
            label: label.to_string(),
            predicate: Box::new(predicate),
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        (self.predicate)(value)
    }
}

impl std::fmt::Debug for TagRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagRule").field("label", &self.label).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComboboxItem {
    pub value: String,
    pub selected: bool,
    pub tags: Vec<String>,
    pub can_rename: bool,
    pub can_delete: bool,
}

type OnChange = Box<dyn FnMut(Option<&str>)>;
type OnCreate = Box<dyn FnMut(&str)>;
type OnRename = Box<dyn FnMut(&str, &str)>;
type OnDelete = Box<dyn FnMut(&str)>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComboboxError {
    #[error("{0} is not the selected item")]
    NotSelected(String),
    #[error("{0} is not available")]
    Unsupported(&'static str),
    #[error("value cannot be empty")]
    Empty,
}

pub struct Combobox {
    values: Vec<String>,
    value: Option<String>,
    search: String,
    always_selected: bool,
    tags: Vec<TagRule>,
    on_change: OnChange,
    on_create: Option<OnCreate>,
    on_rename: Option<OnRename>,
    on_delete: Option<OnDelete>,
}

impl Combobox {
    pub fn new(values: Vec<String>, on_change: impl FnMut(Option<&str>) + 'static) -> Self {
        Self {
            values,
            value: None,
            search: String::new(),
            always_selected: false,
            tags: Vec::new(),
            on_change: Box::new(on_change),
            on_create: None,
            on_rename: None,
            on_delete: None,
        }
    }

    pub fn with_value(mut self, value: Option<&str>) -> Self {
        self.value = value.map(str::to_string);
        self
    }

    pub fn always_selected(mut self) -> Self {
        self.always_selected = true;
        self
    }

    pub fn with_tag(mut self, rule: TagRule) -> Self {
        self.tags.push(rule);
        self
    }

    pub fn on_create(mut self, f: impl FnMut(&str) + 'static) -> Self {
        self.on_create = Some(Box::new(f));
        self
    }

    pub fn on_rename(mut self, f: impl FnMut(&str, &str) + 'static) -> Self {
        self.on_rename = Some(Box::new(f));
        self
    }

    pub fn on_delete(mut self, f: impl FnMut(&str) + 'static) -> Self {
        self.on_delete = Some(Box::new(f));
        self
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn set_values(&mut self, values: Vec<String>) {
        self.values = values;
    }

    /// Controlled update from the owner; does not fire `on_change`.
    pub fn set_value(&mut self, value: Option<&str>) {
        self.value = value.map(str::to_string);
    }

    pub fn set_search(&mut self, query: &str) {
        self.search = query.to_string();
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    /// Items matching the search, case-insensitively, in input order.
    pub fn items(&self) -> Vec<ComboboxItem> {
        let needle = self.search.trim().to_lowercase();
        self.values
            .iter()
            .filter(|v| needle.is_empty() || v.to_lowercase().contains(&needle))
            .map(|v| {
                let selected = self.value.as_deref() == Some(v.as_str());
                ComboboxItem {
                    value: v.clone(),
                    selected,
                    tags: self
                        .tags
                        .iter()
                        .filter(|t| t.matches(v))
                        .map(|t| t.label.clone())
                        .collect(),
                    can_rename: selected && self.on_rename.is_some(),
                    can_delete: selected && self.on_delete.is_some(),
                }
            })
            .collect()
    }

    /// Selecting the current value clears it unless always-selected.
    pub fn select(&mut self, value: &str) {
        let clear = self.value.as_deref() == Some(value) && !self.always_selected;
        self.value = if clear { None } else { Some(value.to_string()) };
        self.search.clear();
        (self.on_change)(self.value.as_deref());
    }

    /// Text offered as "create", when creation is enabled and the search
    /// does not already name an item.
    pub fn create_candidate(&self) -> Option<&str> {
        let query = self.search.trim();
        if self.on_create.is_none() || query.is_empty() {
            return None;
        }
        if self.values.iter().any(|v| v == query) {
            return None;
        }
        Some(query)
    }

    pub fn create(&mut self) -> Result<String, ComboboxError> {
        let candidate = match self.create_candidate() {
            Some(c) => c.to_string(),
            None if self.on_create.is_none() => return Err(ComboboxError::Unsupported("create")),
            None => return Err(ComboboxError::Empty),
        };
        if let Some(f) = self.on_create.as_mut() {
            f(&candidate);
        }
        self.search.clear();
        Ok(candidate)
    }

    pub fn rename(&mut self, value: &str, new_value: &str) -> Result<(), ComboboxError> {
        self.ensure_selected(value)?;
        let new_value = new_value.trim();
        if new_value.is_empty() {
            return Err(ComboboxError::Empty);
        }
        let f = self
            .on_rename
            .as_mut()
            .ok_or(ComboboxError::Unsupported("rename"))?;
        f(value, new_value);
        Ok(())
    }

    pub fn delete(&mut self, value: &str) -> Result<(), ComboboxError> {
        self.ensure_selected(value)?;
        let f = self
            .on_delete
            .as_mut()
            .ok_or(ComboboxError::Unsupported("delete"))?;
        f(value);
        Ok(())
    }

    fn ensure_selected(&self, value: &str) -> Result<(), ComboboxError> {
        if self.value.as_deref() == Some(value) {
            Ok(())
        } else {
            Err(ComboboxError::NotSelected(value.to_string()))
        }
    }
}

/// Rows to materialize for a scrolled list of fixed-height rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualWindow {
    pub row_height: f64,
    pub overscan: usize,
}

impl VirtualWindow {
    pub fn new(row_height: f64, overscan: usize) -> Self {
        Self {
            row_height,
            overscan,
        }
    }

    pub fn range(&self, scroll_offset: f64, viewport_height: f64, total: usize) -> Range<usize> {
        if total == 0 || self.row_height <= 0.0 {
            return 0..0;
        }
        let first = (scroll_offset.max(0.0) / self.row_height).floor() as usize;
        let visible = (viewport_height.max(0.0) / self.row_height).ceil() as usize;
        let start = first.saturating_sub(self.overscan).min(total);
        let end = (first + visible + self.overscan).min(total);
        start..end
    }

    pub fn total_height(&self, total: usize) -> f64 {
        self.row_height * total as f64
    }
}
