//! Structs and functions for generating log messages and printing the analysis report.

use crate::analysis::taint::TaintFlow;
use crate::prelude::*;
use itertools::Itertools;
use std::collections::BTreeSet;

/// A generic log message.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct LogMessage {
    /// The log message.
    pub text: String,
    /// The severity/type of the log message.
    pub level: LogLevel,
    /// The location inside the analyzed program that the message is related to.
    pub location: Option<Tid>,
    /// The analysis where the message originated.
    pub source: Option<String>,
}

impl LogMessage {
    /// Create a new `Info`-level log message
    pub fn new_info(text: impl Into<String>) -> LogMessage {
        LogMessage {
            text: text.into(),
            level: LogLevel::Info,
            location: None,
            source: None,
        }
    }

    /// Create a new `Debug`-level log message
    pub fn new_debug(text: impl Into<String>) -> LogMessage {
        LogMessage {
            text: text.into(),
            level: LogLevel::Debug,
            location: None,
            source: None,
        }
    }

    /// Create a new `Error`-level log message
    pub fn new_error(text: impl Into<String>) -> LogMessage {
        LogMessage {
            text: text.into(),
            level: LogLevel::Error,
            location: None,
            source: None,
        }
    }

    /// Associate a specific location to the log message.
    pub fn location(mut self, location: Tid) -> LogMessage {
        self.location = Some(location);
        self
    }

    /// Set the name of the source analysis for the log message.
    pub fn source(mut self, source: impl Into<String>) -> LogMessage {
        self.source = Some(source.into());
        self
    }
}

/// The severity/type of a log message.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub enum LogLevel {
    /// Messages intended for debugging.
    Debug,
    /// Errors encountered during analysis.
    Error,
    /// Non-error messages intended for the user.
    Info,
}

impl std::fmt::Display for LogMessage {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.level {
            LogLevel::Debug => write!(formatter, "DEBUG: ")?,
            LogLevel::Error => write!(formatter, "ERROR: ")?,
            LogLevel::Info => write!(formatter, "INFO: ")?,
        };
        match (&self.source, &self.location) {
            (Some(source), Some(location)) => write!(formatter, "{} @ {}: ", source, location)?,
            (Some(source), None) => write!(formatter, "{}: ", source)?,
            (None, Some(location)) => write!(formatter, "{}: ", location)?,
            (None, None) => (),
        };
        write!(formatter, "{}", self.text)
    }
}

/// Print all log messages and the taint-flow report.
///
/// Log messages will always be printed to `stdout`.
/// The taint-flow report will either be printed to `stdout` or to the file path provided in `out_path`.
///
/// If `emit_json` is set, the report will be converted to JSON for the output.
pub fn print_all_messages(
    logs: Vec<LogMessage>,
    taint_flows: &BTreeSet<TaintFlow>,
    out_path: Option<&str>,
    emit_json: bool,
) {
    for log in logs {
        println!("{}", log);
    }
    let output: String = if emit_json {
        serde_json::to_string_pretty(taint_flows).unwrap()
    } else if taint_flows.is_empty() {
        "no taint flows found\n".to_string()
    } else {
        taint_flows.iter().map(|flow| format!("{}", flow)).join("\n") + "\n"
    };
    if let Some(file_path) = out_path {
        std::fs::write(file_path, output).unwrap_or_else(|error| {
            panic!("Writing to output path {} failed: {}", file_path, error)
        });
    } else {
        print!("{}", output);
    }
}

/// Filter out debug-level log messages.
/// Used unless verbose output is requested.
pub fn filter_debug_messages(logs: Vec<LogMessage>) -> Vec<LogMessage> {
    logs.into_iter()
        .filter(|log| log.level != LogLevel::Debug)
        .collect()
}
