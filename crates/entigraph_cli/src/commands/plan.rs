//! Plan command implementation.

use crate::error::{CliError, CliResult};
use crate::scenario::{LoadedScenario, Scenario};
use entigraph_core::{EntityState, PersistAction, Session, SessionConfig, Summary};
use serde::Serialize;
use std::path::Path;

/// Options of the plan command.
#[derive(Debug, Clone, Copy)]
pub struct PlanOptions {
    /// Reconcile the roots alone, without their reachable graph.
    pub roots_only: bool,
    /// Skip duplicate merging.
    pub no_merge: bool,
    /// Skip comparison against persisted values.
    pub no_compare: bool,
}

/// Planned action of one named entity.
#[derive(Debug, Serialize)]
pub struct PlannedEntity {
    /// Scenario name.
    pub name: String,
    /// Entity type.
    #[serde(rename = "type")]
    pub type_name: String,
    /// State after reconciliation.
    pub state: EntityState,
    /// Persist action.
    pub action: PersistAction,
    /// Properties flagged as modified.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub modified: Vec<String>,
}

/// Plan result.
#[derive(Debug, Serialize)]
pub struct PlanResult {
    /// Processed entities, in processing order.
    pub entities: Vec<PlannedEntity>,
    /// Action counts.
    pub summary: Summary,
}

/// Runs the plan command.
pub fn run(path: &Path, options: PlanOptions, format: &str) -> CliResult<()> {
    let scenario = Scenario::from_path(path)?;
    let result = plan(scenario.load()?, options)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        "text" => print_text_output(&result),
        other => return Err(CliError::Format(other.to_string())),
    }
    Ok(())
}

/// Reconciles a loaded scenario and collects its plan.
pub fn plan(loaded: LoadedScenario, options: PlanOptions) -> CliResult<PlanResult> {
    let LoadedScenario {
        schema,
        mut graph,
        mut tracker,
        roots,
        names,
    } = loaded;
    let config = SessionConfig::new()
        .merge_duplicates(!options.no_merge)
        .compare_persisted_values(!options.no_compare);
    let mut session = Session::with_config(&schema, &mut graph, &mut tracker, config);

    let adjustments = if roots.is_empty() {
        session.define_state_for_all()?
    } else {
        session.define_state_many(&roots, !options.roots_only)?
    };

    let entities = adjustments
        .plan()?
        .into_iter()
        .map(|planned| PlannedEntity {
            name: names
                .get(&planned.entity)
                .cloned()
                .unwrap_or_else(|| planned.entity.to_string()),
            type_name: planned.type_name,
            state: planned.state,
            action: planned.action,
            modified: planned.modified,
        })
        .collect();

    Ok(PlanResult {
        entities,
        summary: adjustments.summary(),
    })
}

fn print_text_output(result: &PlanResult) {
    println!("EntiGraph Reconciliation Plan");
    println!("=============================");
    println!();
    for entity in &result.entities {
        print!(
            "  {:<12} {:<12} {:<10} {:?}",
            entity.name,
            entity.type_name,
            entity.action.to_string(),
            entity.state
        );
        if !entity.modified.is_empty() {
            print!("  [{}]", entity.modified.join(", "));
        }
        println!();
    }
    println!();
    println!("Summary:");
    println!("  Inserts:  {}", result.summary.inserts);
    println!("  Updates:  {}", result.summary.updates);
    println!("  No-ops:   {}", result.summary.no_ops);
    println!("  Deletes:  {}", result.summary.deletes);
    println!("  Excluded: {}", result.summary.excluded);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::tests::shop_scenario;
    use entigraph_core::{PersistedRow, Value};

    const DEFAULTS: PlanOptions = PlanOptions {
        roots_only: false,
        no_merge: false,
        no_compare: false,
    };

    #[test]
    fn duplicate_products_plan_one_insert() {
        let result = plan(shop_scenario().load().unwrap(), DEFAULTS).unwrap();

        let products: Vec<_> = result
            .entities
            .iter()
            .filter(|e| e.type_name == "Product")
            .collect();
        assert_eq!(products.len(), 2);
        assert_eq!(
            products
                .iter()
                .filter(|p| p.action == PersistAction::Insert)
                .count(),
            1
        );
        assert_eq!(result.summary.inserts, 4);
        assert_eq!(result.summary.excluded, 1);
    }

    #[test]
    fn merging_can_be_switched_off() {
        let options = PlanOptions {
            no_merge: true,
            ..DEFAULTS
        };
        let result = plan(shop_scenario().load().unwrap(), options).unwrap();
        assert_eq!(result.summary.inserts, 5);
        assert_eq!(result.summary.excluded, 0);
    }

    #[test]
    fn persisted_product_is_an_update() {
        let mut scenario = shop_scenario();
        scenario.entities[1]
            .values
            .insert("Name".into(), Value::from("Widget"));
        scenario.persisted.insert(
            "Product".into(),
            vec![PersistedRow::new()
                .with("Id", 7)
                .with("Sku", "X")
                .with("Name", "Gadget")],
        );
        let result = plan(scenario.load().unwrap(), DEFAULTS).unwrap();

        let kept: Vec<_> = result
            .entities
            .iter()
            .filter(|e| e.type_name == "Product" && e.action != PersistAction::Excluded)
            .collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].state, EntityState::Unchanged);
        assert_eq!(kept[0].action, PersistAction::Update);
        assert_eq!(kept[0].modified, vec!["Name".to_string()]);
    }

    #[test]
    fn roots_only_touches_the_roots() {
        let options = PlanOptions {
            roots_only: true,
            ..DEFAULTS
        };
        let result = plan(shop_scenario().load().unwrap(), options).unwrap();
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.entities[0].name, "o1");
        assert_eq!(result.summary.inserts, 1);
    }

    #[test]
    fn plan_serializes_to_json() {
        let result = plan(shop_scenario().load().unwrap(), DEFAULTS).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["summary"]["inserts"], 4);
        assert_eq!(json["entities"][0]["name"], "o1");
        assert_eq!(json["entities"][0]["action"], "insert");
    }
}
