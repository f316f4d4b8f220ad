//! 분석 프롬프트 생성.
//!
//! 4대 디지털 안전 영역(Content/Contact/Conduct/Commercial) 기준 분류 지시와
//! JSON 출력 형식, 보호자 탐지 설정을 하나의 프롬프트로 만든다.

use owl_core::config::DetectionSettings;

const BASE_PROMPT: &str = r#"You are "Project Owl", a child safety assistant. Analyze the screenshot for threats across the four pillars of digital safety.
Return ONLY valid JSON. Do not use Markdown code blocks.

Pillars:
1. Content (what the child sees): pornography, graphic violence, hate speech, self-harm, misinformation.
2. Contact (who the child talks to): grooming, cyberbullying, harassment, stalking, parasocial relationships.
3. Conduct (how the child behaves): sexting, bullying others, illegal downloading, oversharing personal info.
4. Commercial (how the child is influenced): dark patterns such as fake timers, loot boxes and gambling, undisclosed influencer marketing, data harvesting.

Output format:
{
  "commercial_pressure_score": number, // 0-100
  "risk_level": "Low" | "Medium" | "High",
  "detected_threats": [{ "category": "Content" | "Contact" | "Conduct" | "Commercial", "type": string, "description": string }],
  "summary_for_parent": string
}
"#;

/// 탐지 설정을 반영한 분석 프롬프트
pub fn build_analysis_prompt(settings: &DetectionSettings) -> String {
    let mut prompt = String::from(BASE_PROMPT);

    let disabled: Vec<&str> = [
        (settings.influencers, "undisclosed influencer marketing"),
        (settings.urgency, "urgency or scarcity pressure (countdowns, limited offers)"),
        (settings.ads, "ordinary advertising"),
        (settings.lootboxes, "loot boxes and gambling mechanics"),
    ]
    .into_iter()
    .filter(|(enabled, _)| !enabled)
    .map(|(_, label)| label)
    .collect();

    if !disabled.is_empty() {
        prompt.push_str("\nThe parent has turned off these commercial checks; do not raise the score or flag threats for: ");
        prompt.push_str(&disabled.join(", "));
        prompt.push_str(".\n");
    }

    if let Some(custom) = settings
        .custom_prompt
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        prompt.push_str(&format!(
            "\nIMPORTANT PARENT INSTRUCTION: the parent has explicitly asked you to also watch for: \"{custom}\". If this threat is found, flag it as High risk and mention it in the summary.\n"
        ));
    }

    prompt
}
