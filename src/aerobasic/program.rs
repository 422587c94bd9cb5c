//! AeroBasic programs assembled in memory

use std::fmt;
use std::ops::Add;
use std::path::Path;

use chrono::Local;
use tracing::debug;

use crate::aerobasic::AeroBasic;
use crate::domain::errors::DomainError;

const END_PROGRAM: &str = "END PROGRAM";
const CREATED_ON_PREFIX: &str = "' Created on ";
const DECLARE_VARIABLES: &str = "' Declare variables";

/// Switches for [`AeroBasicProgram::render`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub with_variables: bool,
    pub with_ending: bool,
    /// Skip explanatory comments around the variable block
    pub compact: bool,
    pub add_timestamp: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            with_variables: true,
            with_ending: true,
            compact: false,
            add_timestamp: true,
        }
    }
}

impl RenderOptions {
    /// Declarations, lines and ending only
    pub fn plain() -> Self {
        Self {
            compact: true,
            add_timestamp: false,
            ..Self::default()
        }
    }
}

/// Ordered AeroBasic lines plus the variables they use
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AeroBasicProgram {
    lines: Vec<String>,
    variable_names: Vec<String>,
}

impl AeroBasicProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn variable_names(&self) -> &[String] {
        &self.variable_names
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.lines.iter()
    }

    /// Append all lines of another program and adopt its variables
    pub fn append(&mut self, other: &AeroBasicProgram) {
        self.lines.extend(other.lines.iter().cloned());
        for name in &other.variable_names {
            self.declare(name);
        }
    }

    /// Append raw text, one command per line
    pub fn extend_text(&mut self, text: &str) {
        for line in text.split('\n') {
            self.send(line);
        }
    }

    /// Run `body` between `CRITICAL START` and `CRITICAL END`.
    ///
    /// The closing line is written even if `body` returns an error.
    pub fn critical_section<T, F>(&mut self, body: F) -> T
    where
        F: FnOnce(&mut Self) -> T,
    {
        self.send("CRITICAL START");
        let result = body(self);
        self.send("CRITICAL END");
        result
    }

    /// Add text as comment lines; empty lines stay empty
    pub fn comment(&mut self, text: &str) {
        for line in text.split('\n') {
            if line.is_empty() {
                self.send("");
            } else {
                self.send(&format!("' {}", line));
            }
        }
    }

    fn declare(&mut self, name: &str) {
        if !self.variable_names.iter().any(|known| known == name) {
            self.variable_names.push(name.to_string());
        }
    }

    /// Declare a variable (once) and return a handle to assign it
    pub fn create_variable(&mut self, name: &str) -> ProgramVariable<'_> {
        self.declare(name);
        ProgramVariable {
            name: name.to_string(),
            program: self,
        }
    }

    pub fn to_text(&self) -> String {
        self.render(&RenderOptions::plain())
    }

    pub fn render(&self, options: &RenderOptions) -> String {
        let mut s = String::new();
        if options.add_timestamp {
            s.push_str(&format!(
                "{}{} by (AeroBasicProgram)\n",
                CREATED_ON_PREFIX,
                Local::now().format("%Y-%m-%d %H:%M:%S%.6f")
            ));
        }

        if options.with_variables && !self.variable_names.is_empty() {
            if !options.compact {
                s.push_str(DECLARE_VARIABLES);
                s.push('\n');
            }
            for name in &self.variable_names {
                s.push_str(&format!("DVAR ${}\n", name));
            }
            if !options.compact {
                s.push('\n');
            }
        }

        for line in &self.lines {
            s.push_str(line);
            s.push('\n');
        }

        if options.with_ending {
            s.push_str(END_PROGRAM);
            s.push('\n');
        }
        s
    }

    /// Write the program with a timestamp header, creating parent directories
    pub fn write(&self, path: &Path, compact: bool) -> Result<String, DomainError> {
        let text = self.render(&RenderOptions {
            compact,
            ..RenderOptions::default()
        });
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, &text).map_err(|e| {
            DomainError::FsFail(format!("Failed to write program {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), lines = self.lines.len(), "Program written");
        Ok(text)
    }

    /// Copy without comments and/or blank lines
    pub fn optimize(&self, remove_comments: bool, remove_whitespace: bool) -> AeroBasicProgram {
        let lines = self
            .lines
            .iter()
            .filter(|line| !(remove_whitespace && line.trim().is_empty()))
            .filter(|line| !(remove_comments && line.starts_with('\'')))
            .cloned()
            .collect();
        AeroBasicProgram {
            lines,
            variable_names: self.variable_names.clone(),
        }
    }

    /// Parse rendered program text back into lines and variables
    pub fn from_text(text: &str) -> AeroBasicProgram {
        let mut program = AeroBasicProgram::new();
        let mut after_declarations = false;

        for raw in text.lines() {
            let line = raw.trim_end_matches('\r');
            if line.trim() == END_PROGRAM {
                break;
            }
            // Header comments only before the first program line
            let in_header = program.lines.is_empty();
            if in_header && (line.starts_with(CREATED_ON_PREFIX) || line == DECLARE_VARIABLES) {
                continue;
            }
            if let Some(name) = line.trim().strip_prefix("DVAR $") {
                program.declare(name.trim());
                after_declarations = true;
                continue;
            }
            if after_declarations && line.is_empty() && program.lines.is_empty() {
                after_declarations = false;
                continue;
            }
            after_declarations = false;
            program.send(line);
        }
        program
    }
}

impl AeroBasic for AeroBasicProgram {
    fn send(&mut self, command: &str) -> String {
        let command = command.strip_suffix('\n').unwrap_or(command).to_string();
        self.lines.push(command.clone());
        command
    }
}

impl fmt::Display for AeroBasicProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

impl Add<AeroBasicProgram> for AeroBasicProgram {
    type Output = AeroBasicProgram;

    fn add(mut self, rhs: AeroBasicProgram) -> AeroBasicProgram {
        self.append(&rhs);
        self
    }
}

impl Add<&str> for AeroBasicProgram {
    type Output = AeroBasicProgram;

    fn add(mut self, rhs: &str) -> AeroBasicProgram {
        self.send(rhs);
        self
    }
}

impl<'a> IntoIterator for &'a AeroBasicProgram {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}

/// Handle that assigns command results to a declared variable
pub struct ProgramVariable<'a> {
    name: String,
    program: &'a mut AeroBasicProgram,
}

impl ProgramVariable<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Assign a plain value
    pub fn set(&mut self, value: impl fmt::Display) -> String {
        self.program.send(&format!("${} = {}", self.name, value))
    }
}

impl AeroBasic for ProgramVariable<'_> {
    fn send(&mut self, command: &str) -> String {
        self.program.send(&format!("${} = {}", self.name, command))
    }
}
