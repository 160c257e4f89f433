// Prompts for frame scoring. The field names requested here are the ones
// `FrameScore` deserializes.

pub const FRAME_SCORING_SYSTEM: &str = "\
You are a professional tennis coach and analyst. Analyze this tennis video frame and provide \
detailed technical assessment. Focus on:
1. Player stance and positioning
2. Racquet technique and swing mechanics
3. Footwork and movement patterns
4. Court positioning and strategy
5. Overall form and athleticism

Provide scores from 1-10 for each category and specific observations. Return your analysis \
in JSON format with the following structure:
{
  \"stance_score\": number,
  \"technique_score\": number,
  \"footwork_score\": number,
  \"positioning_score\": number,
  \"athleticism_score\": number,
  \"observations\": string,
  \"technical_notes\": string
}";

pub const FRAME_SCORING_PROMPT: &str =
    "Analyze this tennis video frame for technical proficiency and provide detailed scoring.";
