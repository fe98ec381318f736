//! This module contains various utility modules and helper functions.

pub mod log;

use crate::intermediate_representation::Project;
use crate::prelude::*;

/// Read and deserialize the program IR from the file at the given path.
pub fn read_project_file(path: &str) -> Result<Project, Error> {
    let content =
        std::fs::read_to_string(path).context(format!("Could not read project file {path}"))?;
    let project: Project =
        serde_json::from_str(&content).context("Could not parse project file")?;
    Ok(project)
}
