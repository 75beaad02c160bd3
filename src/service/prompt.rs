//! Prompt rendering for the two LLM calls: interest analysis and daily fact.

use crate::types::locale::Locale;
use crate::types::questionnaire::{FactLength, QUESTIONS, QuestionnaireData};

/// How many previous headings are shown to the model to avoid repeats.
pub const PREVIOUS_HEADINGS_LIMIT: i64 = 20;

const ANALYSIS_PREAMBLE: &str = "\
You are an expert behavioral analyst who builds interest profiles from questionnaire answers.

Analyze the questions and answers below and describe:
1. Primary interest categories, each with a confidence level (High/Medium/Low).
2. Interest depth: casual, moderate engagement, or deep expertise.
3. Behavioral patterns: analytical or creative, practical or theoretical, cautious or adventurous.
4. Motivation drivers: curiosity, achievement, social connection, creative expression, problem solving.
5. Communication style: detail-oriented or big-picture, formal or casual.
6. Language preference: the language the user wants to read in.

Give a structured text analysis with clear sections. Separate interests the user stated \
explicitly from interests you infer, and cite the answers that support each finding.

QUESTIONS AND ANSWERS:
";

/// `question: answer` lines for every questionnaire item, `(none)` for blanks.
pub fn render_answers(data: &QuestionnaireData) -> String {
    QUESTIONS
        .iter()
        .zip(data.answers())
        .map(|(question, answer)| {
            let answer = answer.trim();
            if answer.is_empty() {
                format!("{question}: (none)")
            } else {
                format!("{question}: {answer}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_analysis_prompt(data: &QuestionnaireData) -> String {
    format!("{ANALYSIS_PREAMBLE}{}", render_answers(data))
}

pub fn build_fact_prompt(
    analysis: &str,
    previous_headings: &[String],
    length: FactLength,
    locale: Locale,
) -> String {
    let previous = if previous_headings.is_empty() {
        "(none yet)".to_string()
    } else {
        previous_headings
            .iter()
            .map(|h| format!("- {h}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let words = length.target_words();
    let language = locale.language_name();
    let opening = locale.fact_opening();

    format!(
        "\
You are a storyteller who turns history into irresistible gossip: true stories told like \
secrets whispered at a dinner party.

USER INTEREST ANALYSIS:
{analysis}

FACTS ALREADY SENT (do not repeat these):
{previous}

Write ONE historical fact for this reader.
- The first line is a short title for the fact, on its own line.
- The story starts with \"{opening}\".
- Write it in {language}.
- Aim for about {words} words ({length} length).
- Focus on the people behind the events: feuds, blunders, ironies and the gap between public \
image and private reality.
- Keep a conversational, cheeky tone with two or three surprising turns, and end on a hook.
- Every detail must be historically accurate. If something sounds unbelievable but is true, say so.
- Pick the topic from the reader's primary interests and match the depth to their experience.
"
    )
}

/// First non-empty line of a generated fact, markdown emphasis stripped.
pub fn extract_heading(text: &str) -> String {
    text.lines()
        .map(|l| l.trim().trim_matches(|c| matches!(c, '#' | '*' | '_')).trim())
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Interest level of one category given the questionnaire answers:
/// 4 named topic, 3 period mentioned in the description, 2 region mentioned, else 1.
pub fn interest_level(name: &str, description: Option<&str>, data: &QuestionnaireData) -> i64 {
    if data.topics.iter().any(|t| t == name) {
        return 4;
    }
    let description = description.unwrap_or_default().to_lowercase();
    let mentions = |items: &[String]| {
        items
            .iter()
            .any(|item| !item.trim().is_empty() && description.contains(&item.to_lowercase()))
    };
    if mentions(&data.time_periods) {
        3
    } else if mentions(&data.regional_interests) {
        2
    } else {
        1
    }
}
