use super::domain::ComposerMode;

/// Decides whether the natural-language composer should be engaged for a
/// run. Pure: tenant configuration and run facts in, verdict out. Evaluated
/// once per client per run; the composer itself still falls back to the
/// deterministic template if the collaborator fails.
pub fn should_use_composer(
    mode: ComposerMode,
    min_change_count: u32,
    change_count: usize,
    is_scheduled_run: bool,
) -> bool {
    let meets_minimum = change_count >= min_change_count as usize;
    match mode {
        ComposerMode::Never => false,
        ComposerMode::Always => true,
        ComposerMode::Scheduled => is_scheduled_run && meets_minimum,
        ComposerMode::Meaningful => meets_minimum,
    }
}
