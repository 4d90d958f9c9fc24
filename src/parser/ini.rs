//! Minimal INI reader for tox.ini and setup.cfg
//!
//! Only keeps what the dependency parsers need: sections, options and the
//! individual lines of multi-line option values with their line numbers.

use crate::parser::LogicalLine;

/// One option and the lines of its value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniOption {
    pub name: String,
    /// Non-empty value lines, trimmed, in order
    pub lines: Vec<LogicalLine>,
}

/// One `[section]` and its options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniSection {
    pub name: String,
    pub options: Vec<IniOption>,
}

/// A parsed INI document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    pub sections: Vec<IniSection>,
}

impl IniDocument {
    /// Read INI content; lines that fit no construct are ignored
    pub fn parse(content: &str) -> Self {
        let mut document = IniDocument::default();

        for (index, raw) in content.lines().enumerate() {
            let number = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                document.sections.push(IniSection {
                    name: trimmed[1..trimmed.len() - 1].trim().to_string(),
                    options: Vec::new(),
                });
                continue;
            }

            let Some(section) = document.sections.last_mut() else {
                continue;
            };

            let indented = raw.starts_with([' ', '\t']);
            if indented {
                if let Some(option) = section.options.last_mut() {
                    option.lines.push(LogicalLine {
                        number,
                        text: trimmed.to_string(),
                    });
                }
                continue;
            }

            if let Some(pos) = trimmed.find(['=', ':']) {
                let name = trimmed[..pos].trim().to_string();
                let value = trimmed[pos + 1..].trim();
                let mut option = IniOption {
                    name,
                    lines: Vec::new(),
                };
                if !value.is_empty() {
                    option.lines.push(LogicalLine {
                        number,
                        text: value.to_string(),
                    });
                }
                section.options.push(option);
            }
        }

        document
    }

    /// Find a section by name
    pub fn section(&self, name: &str) -> Option<&IniSection> {
        self.sections.iter().find(|s| s.name == name)
    }
}

impl IniSection {
    /// Find an option by name
    pub fn option(&self, name: &str) -> Option<&IniOption> {
        self.options.iter().find(|o| o.name == name)
    }
}
