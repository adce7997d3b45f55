use super::types::AuditMode;

pub const CLAIM_RESEARCH_PROMPT: &str = r#"You are an epistemic auditor. Given a claim, you must:

1. Break the claim into 2-4 distinct, testable sub-claims.
2. For each sub-claim, search for credible evidence FOR and AGAINST it.
3. Cite specific sources with URLs where available.
4. Weigh the strength of the evidence on each side.
5. Give an overall assessment of how well supported the claim is.
6. Name 4-6 key concepts related to this claim.

Be thorough and balanced. Cite specific data points and sources."#;

pub const FORECAST_RESEARCH_PROMPT: &str = r#"You are an epistemic forecasting analyst. Given a probability forecast, you must:

1. Identify the stated probability and timeframe.
2. Find relevant base rates for similar events or outcomes.
3. Identify 2-3 reference classes (categories of similar predictions).
4. Assess calibration: is the stated probability reasonable given the evidence?
5. Give an adjusted probability estimate with reasoning.
6. Search for credible evidence and data points.
7. Name 4-6 key concepts related to this forecast.

Be thorough and balanced. Cite specific data points and sources."#;

pub const DEFINITION_RESEARCH_PROMPT: &str = r#"You are an epistemic encyclopedia. Given a concept, you must:

1. Give a clear, precise definition (2-3 sentences).
2. Identify 2-3 key ongoing debates or tensions around the concept.
3. Identify 2-3 common misconceptions people hold about it.
4. Suggest 4-6 related concepts that help in understanding it.
5. Cite specific sources where relevant.

Be thorough, precise, and academic in tone."#;

pub const CLAIM_EXTRACTION_PROMPT: &str = r#"Extract the epistemic analysis into this exact JSON structure. Return ONLY valid JSON:

{
  "claim": "the original claim text",
  "sub_claims": [
    {
      "title": "concise sub-claim statement",
      "evidence_for": ["specific evidence point with source"],
      "evidence_against": ["specific evidence point with source"],
      "confidence": "High | Moderate | Low"
    }
  ],
  "overall_score": "Strong | Moderate | Weak | Unsupported",
  "summary": "2-3 sentence summary of the epistemic analysis",
  "related_concepts": ["concept 1", "concept 2", "concept 3", "concept 4"],
  "source_urls": ["https://example.com"]
}

Rules:
- confidence per sub-claim must be exactly "High", "Moderate", or "Low"
- overall_score must be exactly "Strong", "Moderate", "Weak", or "Unsupported"
- Include ALL source URLs from the analysis
- evidence arrays should hold concrete, specific items
- related_concepts should be 4-6 key concepts mentioned in or relevant to the analysis
- Extract faithfully from the provided text"#;

pub const FORECAST_EXTRACTION_PROMPT: &str = r#"Extract the forecast analysis into this exact JSON structure. Return ONLY valid JSON:

{
  "forecast": "the original forecast text",
  "stated_probability": "the probability stated in the forecast",
  "adjusted_probability": "your adjusted probability based on evidence",
  "base_rate_analysis": "2-3 sentence analysis of relevant base rates",
  "reference_classes": [
    { "name": "reference class name", "base_rate": "historical rate", "relevance": "why relevant" }
  ],
  "calibration_assessment": "2-3 sentence assessment of forecast calibration",
  "overall_score": "Strong | Moderate | Weak | Unsupported",
  "summary": "2-3 sentence summary",
  "related_concepts": ["concept 1", "concept 2", "concept 3", "concept 4"],
  "source_urls": ["https://example.com"]
}

Rules:
- overall_score reflects how well calibrated and evidence-supported the forecast is
- related_concepts should be 4-6 key concepts relevant to the forecast
- Extract faithfully from the provided text"#;

pub const DEFINITION_EXTRACTION_PROMPT: &str = r#"Extract the concept analysis into this exact JSON structure. Return ONLY valid JSON:

{
  "concept": "the concept name",
  "definition": "clear 2-3 sentence definition",
  "key_debates": [
    { "title": "debate title", "description": "1-2 sentence description" }
  ],
  "common_misconceptions": [
    { "misconception": "what people wrongly think", "reality": "what is actually true" }
  ],
  "related_concepts": ["concept 1", "concept 2", "concept 3", "concept 4", "concept 5"],
  "source_urls": ["https://example.com"]
}

Rules:
- definition should be precise and academic
- key_debates should have 2-3 items
- common_misconceptions should have 2-3 items
- related_concepts should have 4-6 items
- Extract faithfully from the provided text"#;

pub const STEELMAN_PROMPT: &str = "You are an epistemic analyst. Given a claim, construct the strongest possible version of it (the \"steel man\"). Find the best evidence, the most favorable interpretations, and the most credible supporters. Present the strongest case FOR the claim. Cite sources and keep your response to 3-4 paragraphs.";

pub const CRUX_PROMPT: &str = "You are an epistemic analyst. Given a claim, identify the single most important disagreement or uncertainty underlying it: the crux that, if resolved, would most change our assessment. Be specific, explain why it is the crux, and cite evidence from both sides. Keep your response to 3-4 paragraphs.";

pub const HISTORICAL_PROMPT: &str = "You are an epistemic analyst. Given a claim or prediction, identify 2-3 historical claims or predictions that were structurally similar. For each, explain what was predicted, what actually happened, and which lessons apply. Cite specific examples with dates and outcomes. Keep your response to 3-4 paragraphs.";

pub fn research_prompt(mode: AuditMode) -> &'static str {
    match mode {
        AuditMode::Claim => CLAIM_RESEARCH_PROMPT,
        AuditMode::Forecast => FORECAST_RESEARCH_PROMPT,
        AuditMode::Definition => DEFINITION_RESEARCH_PROMPT,
    }
}

pub fn extraction_prompt(mode: AuditMode) -> &'static str {
    match mode {
        AuditMode::Claim => CLAIM_EXTRACTION_PROMPT,
        AuditMode::Forecast => FORECAST_EXTRACTION_PROMPT,
        AuditMode::Definition => DEFINITION_EXTRACTION_PROMPT,
    }
}

pub fn research_message(mode: AuditMode, input: &str) -> String {
    match mode {
        AuditMode::Claim => format!("Analyze this claim: \"{}\"", input),
        AuditMode::Forecast => format!("Analyze this probability forecast: \"{}\"", input),
        AuditMode::Definition => format!("Define and analyze this concept: \"{}\"", input),
    }
}

pub fn extraction_message(answer_text: &str) -> String {
    format!(
        "Extract the following analysis into structured JSON:\n\n{}",
        answer_text
    )
}
