use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color as TableColor, ContentArrangement, Table};

use crate::events::Transition;
use crate::octane::structure::{CiJobsList, PipelineNode};
use crate::octane::BuildResult;

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn result_cell(result: BuildResult) -> Cell {
    let cell = Cell::new(format!("{result:?}").to_lowercase());
    match result {
        BuildResult::Success => cell.fg(TableColor::Green),
        BuildResult::Aborted => cell.fg(TableColor::Yellow),
        BuildResult::Failure => cell.fg(TableColor::Red),
    }
}

pub fn transition_cell(transition: Transition) -> Cell {
    match transition {
        Transition::PipelineStart => Cell::new("pipeline started").fg(TableColor::Cyan),
        Transition::StageEnd => Cell::new("stage finished"),
        Transition::PipelineEnd(result) => result_cell(result).add_attribute(Attribute::Bold),
        Transition::Ignore => Cell::new("ignored").fg(TableColor::DarkGrey),
    }
}

/// One row per pipeline, with its stages in order when the structure is known.
pub fn pipelines_table(list: &CiJobsList, structures: &[Option<PipelineNode>]) -> Table {
    let mut table = create_table();
    table.set_header(vec!["Pipeline", "Stages"]);

    for (pipeline, structure) in list.jobs.iter().zip(structures) {
        let stages = structure
            .as_ref()
            .and_then(|node| node.phases_internal.first())
            .map_or_else(|| "-".to_string(), |phase| {
                phase
                    .jobs
                    .iter()
                    .map(|stage| stage.name.as_str())
                    .collect::<Vec<_>>()
                    .join(" → ")
            });
        table.add_row(vec![Cell::new(&pipeline.name), Cell::new(stages)]);
    }

    table
}
