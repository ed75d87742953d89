// Shared prompt fragments.
// Each module that needs LLM calls defines its own prompts.rs alongside it;
// this file holds the pieces every evaluation prompt repeats.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Scoring scale shared by SJT and JDT evaluation prompts.
pub const SCORE_SCALE_INSTRUCTION: &str = "\
    SCORING SCALE (integer 1-5):\n\
    5 = Exemplary: fully matches the best response, addresses every key aspect with concrete actions.\n\
    4 = Strong: matches the best response with only minor omissions.\n\
    3 = Adequate: partially matches; important aspects are vague or missing.\n\
    2 = Weak: mostly misses the best response or leans toward the worst response.\n\
    1 = Poor: matches the worst response, is off-topic, or is empty.";

/// Instruction that keeps the model scoring content rather than delivery.
pub const FAIRNESS_INSTRUCTION: &str = "\
    CRITICAL: The answer is an automatic transcription of spoken audio. \
    Ignore grammar, filler words, accents, and transcription artifacts. \
    Score ONLY the substance of what the candidate would do and why. \
    Never reward length for its own sake.";

/// Substitutes `{name}` placeholders in one left-to-right pass.
///
/// Substituted text is never rescanned, so candidate answers or admin content
/// that happen to contain `{answer}` or `{history}` reach the model verbatim.
/// Braces that do not name a known placeholder (the JSON schema examples in
/// templates) are copied through unchanged.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (close, *value))
        });
        match value {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
