//! Owned iCalendar component tree.
//!
//! Parsing goes through the icalendar crate's parser; the borrowed parser
//! tree is copied into [`CalendarComponent`] so it can outlive the input.
//! TEXT values arrive already unescaped.

use icalendar::parser::{self, read_calendar, unfold};

use crate::error::{CoreError, CoreResult};

/// A content line: name, parameters and a single text value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarProperty {
    pub name: String,
    pub params: Vec<(String, String)>,
    pub value: String,
}

impl CalendarProperty {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        CalendarProperty {
            name: name.into(),
            params: Vec::new(),
            value: value.into(),
        }
    }

    /// First value of parameter `key` (case-insensitive), without quotes.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.trim_matches('"'))
    }
}

impl From<&parser::Property<'_>> for CalendarProperty {
    fn from(prop: &parser::Property<'_>) -> Self {
        CalendarProperty {
            name: prop.name.to_string().to_ascii_uppercase(),
            params: prop
                .params
                .iter()
                .map(|p| {
                    let value = p.val.as_ref().map(|v| v.to_string()).unwrap_or_default();
                    (p.key.to_string().to_ascii_uppercase(), value)
                })
                .collect(),
            value: prop.val.to_string(),
        }
    }
}

/// A named block (VCALENDAR, VEVENT, VALARM, ...) with ordered properties and
/// nested sub-components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarComponent {
    name: String,
    pub properties: Vec<CalendarProperty>,
    pub components: Vec<CalendarComponent>,
}

impl CalendarComponent {
    pub fn new(name: impl Into<String>) -> Self {
        CalendarComponent {
            name: name.into(),
            properties: Vec::new(),
            components: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// First property called `name`.
    pub fn property(&self, name: &str) -> Option<&CalendarProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn properties_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a CalendarProperty> {
        self.properties.iter().filter(move |p| p.name == name)
    }

    pub fn components_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a CalendarComponent> {
        self.components.iter().filter(move |c| c.name == name)
    }
}

impl From<&parser::Component<'_>> for CalendarComponent {
    fn from(component: &parser::Component<'_>) -> Self {
        CalendarComponent {
            name: component.name.to_string().to_ascii_uppercase(),
            properties: component.properties.iter().map(CalendarProperty::from).collect(),
            components: component.components.iter().map(CalendarComponent::from).collect(),
        }
    }
}

/// Parse calendar text into a VCALENDAR component.
pub fn parse_calendar(text: &str) -> CoreResult<CalendarComponent> {
    if text.trim().is_empty() {
        return Err(CoreError::EmptyCalendar);
    }

    let unfolded = unfold(text);
    let calendar = read_calendar(&unfolded).map_err(|e| CoreError::IcsParse(e.to_string()))?;

    let mut root = CalendarComponent::new("VCALENDAR");
    root.properties = calendar.properties.iter().map(CalendarProperty::from).collect();
    root.components = calendar.components.iter().map(CalendarComponent::from).collect();
    Ok(root)
}
