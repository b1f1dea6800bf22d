//! Order command implementation.

use crate::error::{CliError, CliResult};
use crate::scenario::{LoadedScenario, Scenario};
use entigraph_core::{EntityHandle, Session};
use serde::Serialize;
use std::path::Path;

/// Processing order of one type.
#[derive(Debug, Serialize)]
pub struct TypeOrder {
    /// Type name.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Scenario entities of the type, parents first.
    pub entities: Vec<String>,
}

/// Runs the order command.
pub fn run(path: &Path, format: &str) -> CliResult<()> {
    let scenario = Scenario::from_path(path)?;
    let result = order(scenario.load()?)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        "text" => print_text_output(&result),
        other => return Err(CliError::Format(other.to_string())),
    }
    Ok(())
}

/// Computes the type order and the within-type order of every entity.
pub fn order(loaded: LoadedScenario) -> CliResult<Vec<TypeOrder>> {
    let LoadedScenario {
        schema,
        mut graph,
        mut tracker,
        names,
        ..
    } = loaded;
    let mut by_type: Vec<(String, Vec<EntityHandle>)> = Vec::new();
    for handle in graph.handles() {
        let type_name = graph.type_name(handle)?;
        match by_type.iter_mut().find(|(name, _)| name == type_name) {
            Some((_, handles)) => handles.push(handle),
            None => by_type.push((type_name.to_string(), vec![handle])),
        }
    }

    let mut session = Session::new(&schema, &mut graph, &mut tracker);
    let mut result = Vec::new();
    for type_name in session.type_processing_order()? {
        let instances = by_type
            .iter()
            .find(|(name, _)| *name == type_name)
            .map(|(_, handles)| handles.clone())
            .unwrap_or_default();
        let entities = session
            .within_type_order(&instances)?
            .into_iter()
            .map(|h| names.get(&h).cloned().unwrap_or_else(|| h.to_string()))
            .collect();
        result.push(TypeOrder {
            type_name,
            entities,
        });
    }
    Ok(result)
}

fn print_text_output(result: &[TypeOrder]) {
    println!("EntiGraph Processing Order");
    println!("==========================");
    println!();
    for (rank, ty) in result.iter().enumerate() {
        println!("  {}. {}", rank + 1, ty.type_name);
        if !ty.entities.is_empty() {
            println!("     {}", ty.entities.join(" -> "));
        }
    }
}
