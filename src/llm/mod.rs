pub mod skills;

use serde::Deserialize;
use serde_json::Value;

use crate::models::{CvProfile, Job, Priority};
use skills::SkillOverlap;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    RequestFailed(String),
}

#[derive(Debug, Clone)]
pub struct Analysis {
    pub score: i32,
    pub reasoning: String,
    pub alignments: Vec<String>,
    pub gaps: Vec<String>,
    pub priority: Priority,
}

#[derive(Debug, Deserialize)]
struct AnalysisPayload {
    score: i32,
    reasoning: String,
    #[serde(default)]
    alignments: Vec<String>,
    #[serde(default)]
    gaps: Vec<String>,
}

/// Thin client over the configured LLM provider. A plain
/// `reqwest::Client` with a 60s timeout, the same client-construction idiom
/// used throughout the source adapters.
pub struct LlmAnalyzer {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl LlmAnalyzer {
    pub fn new(api_key: String, base_url: String) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
.timeout(std::time::Duration::from_secs(60))
.build()
.map_err(|e| LlmError::RequestFailed(format!("failed to build llm client: {e}")))?;
        Ok(LlmAnalyzer {
            client,
            api_key,
            base_url,
        })
    }

    /// Computes the skill-overlap summary, builds the prompt, calls the
    /// provider, and parses the response with one repair pass. On
    /// irrecoverable parse failure, returns a `claude_score`-less analysis
    /// with `reasoning = "analysis unavailable"` rather than erroring the
    /// caller — the Matching Engine still has `semantic_score` to fall back
    /// on.
    pub async fn analyze(&self, profile: &CvProfile, job: &Job) -> Result<Option<Analysis>, LlmError> {
        let overlap = skills::compute_overlap(profile, job);
        let prompt = build_prompt(profile, job, &overlap);

        let body = serde_json::json!({
            "model": "claude-haiku-4-5",
            "max_tokens": 512,
            "messages": [{"role": "user", "content": prompt}],
        });

        let resp = self
.client
.post(format!("{}/messages", self.base_url))
.header("x-api-key", &self.api_key)
.header("anthropic-version", "2023-06-01")
.json(&body)
.send()
.await
.map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(LlmError::RequestFailed(format!("llm returned {}", resp.status())));
        }

        let raw_text = extract_text(
            &resp
.json::<Value>()
.await
.map_err(|e| LlmError::RequestFailed(e.to_string()))?,
        );

        match parse_payload(&raw_text) {
            Some(payload) => Ok(Some(to_analysis(payload))),
            None => Ok(None),
        }
    }
}

fn extract_text(body: &Value) -> String {
    body.get("content")
.and_then(|c| c.as_array())
.and_then(|a| a.first())
.and_then(|block| block.get("text"))
.and_then(|v| v.as_str())
.unwrap_or_default()
.to_string()
}

/// Parses the model's JSON payload, attempting one repair pass (strip code
/// fences, drop trailing commas) if the first parse fails.
fn parse_payload(raw_text: &str) -> Option<AnalysisPayload> {
    if let Ok(payload) = serde_json::from_str::<AnalysisPayload>(raw_text) {
        return Some(payload);
    }

    let repaired = repair_json(raw_text);
    serde_json::from_str::<AnalysisPayload>(&repaired).ok()
}

fn repair_json(raw_text: &str) -> String {
    let stripped = raw_text
.trim()
.trim_start_matches("```json")
.trim_start_matches("```")
.trim_end_matches("```")
.trim();
    // Drop trailing commas before a closing brace/bracket.
    let mut repaired = String::with_capacity(stripped.len());
    let chars: Vec<char> = stripped.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c == ',' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && (chars[j] == '}' || chars[j] == ']') {
                continue;
            }
        }
        repaired.push(c);
    }
    repaired
}

fn to_analysis(payload: AnalysisPayload) -> Analysis {
    let score = payload.score.clamp(0, 100);
    Analysis {
        score,
        reasoning: truncate(&payload.reasoning, 400),
        alignments: payload.alignments.into_iter().take(5).collect(),
        gaps: payload.gaps.into_iter().take(5).collect(),
        priority: Priority::from_score(score),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

fn build_prompt(profile: &CvProfile, job: &Job, overlap: &SkillOverlap) -> String {
    format!(
        r#"You are scoring how well a candidate matches a job posting.

Candidate summary: {}
Candidate seniority: {}
Candidate years of experience: {}

Job title: {}
Job company: {}
Job requirements summary: {}

Skill overlap: {:.0}% match. Matching skills: {}. Missing skills: {}.

Scoring calibration:
- skill_match >= 0.8 -> anchor 85-95
- 0.6-0.79 -> 75-84
- 0.4-0.59 -> 60-74
- < 0.4 -> below 60
Adjust +/-5 for experience, industry, and arrangement fit.

Respond with ONLY a JSON object: {{"score": <0-100>, "reasoning": "<=400 chars", "alignments": [<=5 short strings], "gaps": [<=5 short strings]}}"#,
        profile.semantic_summary,
        profile.derived_seniority.as_deref().unwrap_or("unspecified"),
        profile
.total_years_experience
.map(|y| y.to_string())
.unwrap_or_else(|| "unspecified".to_string()),
        job.title,
        job.company,
        job.ai_requirements_summary.as_deref().unwrap_or("n/a"),
        overlap.skill_match_pct * 100.0,
        overlap.matching_skills.join(", "),
        overlap.missing_skills.join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_payload_accepts_clean_json() {
        let raw = r#"{"score": 80, "reasoning": "Good fit", "alignments": ["Rust"], "gaps": []}"#;
        let payload = parse_payload(raw).expect("parses");
        assert_eq!(payload.score, 80);
    }

    #[test]
    fn parse_payload_repairs_code_fence_and_trailing_comma() {
        let raw = "```json\n{\"score\": 70, \"reasoning\": \"ok\", \"alignments\": [\"a\",],}\n```";
        let payload = parse_payload(raw).expect("parses after repair");
        assert_eq!(payload.score, 70);
    }

    #[test]
    fn parse_payload_returns_none_on_garbage() {
        assert!(parse_payload("not json at all").is_none());
    }

    #[test]
    fn to_analysis_clamps_score_and_derives_priority() {
        let payload = AnalysisPayload {
            score: 150,
            reasoning: "x".repeat(500),
            alignments: vec!["a".into(); 10],
            gaps: vec![],
        };
        let analysis = to_analysis(payload);
        assert_eq!(analysis.score, 100);
        assert_eq!(analysis.priority, Priority::High);
        assert_eq!(analysis.reasoning.chars().count(), 400);
        assert_eq!(analysis.alignments.len(), 5);
    }
}
