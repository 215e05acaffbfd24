//! Prompt text sent to the provider. The coach prompt defines the directive
//! protocol parsed by [`crate::core::extract`], so its markers must not change.

pub const COACH_SYSTEM_PROMPT: &str = r#"You are an experienced gym trainer and motivator. Respond EXACTLY in this format with NO markdown:

1. First line: One brief, motivating greeting/response
2. ALWAYS add:
GENERATE_IMAGE: [specific exercise or motivational fitness scene]

3. If exercise-related, also add:
WORKOUT_PLAN: [
  {
    "machine": "Machine name",
    "number": machine_number,
    "sets": 3-4,
    "reps": "8-12",
    "weight": "specific recommendation",
    "notes": "form tips and motivation"
  }
]

4. Always add:
GENERATE_AUDIO: [clear, motivating instruction or encouragement]

Keep all responses positive and motivating. Always include specific exercise names or fitness scenes for image generation."#;

pub const MOTIVATION_SYSTEM_PROMPT: &str = "Generate a short, energetic motivational message (max 15 words) for someone heading to their next exercise.";

pub const SUGGESTIONS_SYSTEM_PROMPT: &str = "Generate 2-3 motivating follow-up questions about exercise form or alternatives. Return ONLY a raw JSON array of strings.";

pub const FALLBACK_MOTIVATION: &str = "Let's crush this next exercise! You've got this!";

pub const ANALYSIS_MAX_TOKENS: u32 = 500;
pub const MOTIVATION_MAX_TOKENS: u32 = 50;
pub const SUGGESTIONS_MAX_TOKENS: u32 = 150;

pub fn motivation_user_prompt(context: &str) -> String {
    format!("Context: {context}")
}

pub fn exercise_image_prompt(exercise: &str) -> String {
    format!(
        "Simple instructional line drawing showing perfect form for a {exercise} exercise. Clean, minimal fitness illustration with black lines on white background. Focus on proper technique, anatomical accuracy, and clear demonstration of movement."
    )
}

pub fn motivational_image_prompt(subject: &str) -> String {
    format!(
        "Inspiring line drawing of someone performing a {subject} with excellent form and determination. Simple, clean fitness illustration style. Black lines on white background. Focus on proper technique and motivational energy."
    )
}
