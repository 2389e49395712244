/// Where a stage sits inside its pipeline's configured stage order.
///
/// Names must match exactly; an empty configuration matches nothing, so an
/// unknown pipeline never fires a start or end event on position alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StagePosition {
    pub is_first: bool,
    pub is_last: bool,
}

impl StagePosition {
    pub fn classify(stage_name: &str, stages: &[String]) -> Self {
        Self {
            is_first: is_first_stage(stage_name, stages),
            is_last: is_last_stage(stage_name, stages),
        }
    }
}

pub fn is_first_stage(stage_name: &str, stages: &[String]) -> bool {
    stages.first().is_some_and(|first| first == stage_name)
}

pub fn is_last_stage(stage_name: &str, stages: &[String]) -> bool {
    stages.last().is_some_and(|last| last == stage_name)
}
