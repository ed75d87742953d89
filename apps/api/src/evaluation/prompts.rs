// All LLM prompt constants for the evaluation module.
// Reuses cross-cutting fragments from llm_client::prompts.
// Templates are filled with `llm_client::prompts::fill_template`.

/// System prompt for SJT answer evaluation.
pub const SJT_EVALUATION_SYSTEM: &str = "You are an experienced assessment-centre assessor \
    scoring answers to situational judgment test scenarios against an expert rubric. \
    You are strict, consistent, and evidence-based.";

/// SJT evaluation prompt template.
/// Replace: {json_only}, {score_scale}, {fairness}, {competency}, {situation},
///          {question}, {best_rationale}, {worst_rationale}, {history},
///          {answer}, {follow_ups_remaining}
pub const SJT_EVALUATION_PROMPT_TEMPLATE: &str = r#"{fairness}

COMPETENCY ASSESSED: {competency}

SCENARIO:
{situation}

QUESTION ASKED:
{question}

RUBRIC
Best response rationale: {best_rationale}
Worst response rationale: {worst_rationale}

EARLIER EXCHANGES ON THIS SCENARIO (oldest first):
{history}

CANDIDATE'S LATEST ANSWER:
{answer}

{score_scale}

Evaluate the candidate's understanding of the scenario across ALL exchanges above,
then return a JSON object with this EXACT schema:
{
  "score": 3,
  "is_complete": false,
  "missing_aspects": ["how they would follow up with the colleague"],
  "follow_up_question": "You mentioned talking to your colleague. What would you do if the behaviour continued?",
  "rationale": "Two or three sentences explaining the score with reference to the rubric."
}

RULES:
1. "missing_aspects" lists the rubric points the candidate has NOT yet covered. Empty if none.
2. Set "is_complete" to true only when the answer covers the rubric well enough that a follow-up would add nothing.
3. If "is_complete" is false, "follow_up_question" MUST be ONE open question probing the most important missing aspect.
   Do not reveal the best response, do not lead the candidate, do not prefix it with a label.
4. If "is_complete" is true, set "follow_up_question" to null.
5. Follow-up questions remaining for this scenario: {follow_ups_remaining}.

{json_only}"#;

/// System prompt for JDT answer evaluation.
pub const JDT_EVALUATION_SYSTEM: &str = "You are an expert technical interviewer scoring \
    answers to job-description-based interview questions against the hiring team's \
    preferred answer.";

/// JDT evaluation prompt template.
/// Replace: {json_only}, {score_scale}, {fairness}, {job_description}, {competency},
///          {question}, {preferred_answer}, {answer}
pub const JDT_EVALUATION_PROMPT_TEMPLATE: &str = r#"{fairness}

JOB DESCRIPTION:
{job_description}

COMPETENCY ASSESSED: {competency}

QUESTION:
{question}

PREFERRED ANSWER (what the hiring team looks for):
{preferred_answer}

CANDIDATE'S ANSWER:
{answer}

{score_scale}

Return a JSON object with this EXACT schema:
{
  "score": 4,
  "strengths": ["Concrete example of running sprint retrospectives"],
  "missing_aspects": ["No mention of how estimates were produced"],
  "rationale": "Two or three sentences explaining the score with reference to the preferred answer."
}

{json_only}"#;

/// System prompt for competency narrative summaries.
pub const COMPETENCY_SUMMARY_SYSTEM: &str = "You are an assessment report writer. \
    You write concise, neutral, evidence-based competency summaries for hiring managers. \
    Respond with plain text only: no headings, no bullet points, no markdown.";

/// Competency summary prompt template.
/// Replace: {competency}, {definition}, {average_score}, {rating}, {follow_ups}, {evidence}
pub const COMPETENCY_SUMMARY_PROMPT_TEMPLATE: &str = r#"Write a 2-3 sentence summary of the candidate's performance on the competency "{competency}".

Competency definition: {definition}

Average score after follow-up penalties: {average_score} / 5 ({rating})
Clarifying follow-up questions needed: {follow_ups}

Per-scenario evidence:
{evidence}

Mention the strongest behaviour observed and the most important development area.
Do not repeat the numbers verbatim and do not speculate beyond the evidence."#;
