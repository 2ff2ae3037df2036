use crate::chatbot::Trigger;

/// Triggers that fire for `utterance`, in configuration order.
pub fn evaluate(triggers: &[Trigger], utterance: &str) -> Vec<Trigger> {
    triggers
        .iter()
        .filter(|t| t.matches(utterance))
        .cloned()
        .collect()
}

/// Prompt hints for fired triggers, without repeats.
pub fn logic_hints(fired: &[Trigger]) -> Vec<String> {
    let mut hints: Vec<String> = Vec::new();
    for trigger in fired {
        let hint = trigger.feature.hint();
        if !hints.contains(&hint) {
            hints.push(hint);
        }
    }
    hints
}
