//! Representative roster warm-up.
//!
//! Runs once before a batch. The roster it returns is shared read-only by
//! every record pipeline and covers every [`Department`].

use std::sync::Arc;

use super::record::{PipelineError, PipelineStage};
use crate::llm::StructuredClient;
use crate::prompts;
use crate::schema::{Department, Representative};

/// Extra generations allowed beyond the requested roster size.
pub const EXTRA_ATTEMPTS: usize = 6;

/// Generates `count` representatives, at least one per department.
///
/// Candidates with a name already on the roster are discarded, as is any
/// candidate that would leave too few slots to cover the missing
/// departments. Discards consume attempts; after `count + EXTRA_ATTEMPTS`
/// generations the warm-up gives up with [`PipelineError::Roster`]. A failed
/// generation call ends the warm-up immediately.
pub async fn build_roster(
    client: &StructuredClient,
    count: usize,
) -> Result<Arc<[Representative]>, PipelineError> {
    let stage = PipelineStage::GenerateServiceRepresentative;
    let budget = count + EXTRA_ATTEMPTS;
    let mut roster: Vec<Representative> = Vec::with_capacity(count);

    for attempt in 1..=budget {
        if roster.len() >= count {
            break;
        }

        let covered = covered_departments(&roster);
        let taken: Vec<String> = roster.iter().map(|r| r.name.clone()).collect();
        let prompt = prompts::representative_prompt(&covered, &taken)
            .map_err(PipelineError::prompt_at(stage))?;
        let candidate: Representative = client
            .generate(&prompt)
            .await
            .map_err(PipelineError::at(stage))?;

        let missing = Department::ALL.len() - covered.len();
        let open_slots = count - roster.len();
        let duplicate = taken
            .iter()
            .any(|name| name.trim().eq_ignore_ascii_case(candidate.name.trim()));
        let fills_gap = !covered.contains(&candidate.department);

        if duplicate {
            tracing::debug!(attempt, name = %candidate.name, "Discarding duplicate representative");
            continue;
        }
        if open_slots <= missing && !fills_gap {
            tracing::debug!(
                attempt,
                department = %candidate.department,
                "Discarding representative for an already covered department"
            );
            continue;
        }

        tracing::info!(
            name = %candidate.name,
            department = %candidate.department,
            "Representative added to roster"
        );
        roster.push(candidate);
    }

    let missing: Vec<&str> = Department::ALL
        .iter()
        .filter(|d| !roster.iter().any(|r| r.department == **d))
        .map(Department::as_str)
        .collect();
    if roster.len() < count || !missing.is_empty() {
        return Err(PipelineError::Roster(format!(
            "got {} of {count} representatives after {budget} attempts (missing departments: {})",
            roster.len(),
            if missing.is_empty() {
                "none".to_string()
            } else {
                missing.join(", ")
            }
        )));
    }

    Ok(roster.into())
}

fn covered_departments(roster: &[Representative]) -> Vec<Department> {
    Department::ALL
        .iter()
        .copied()
        .filter(|d| roster.iter().any(|r| r.department == *d))
        .collect()
}
