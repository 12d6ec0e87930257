//! Prompt assembly for utterance generation and reflective thought.

use colloquy_core::Utterance;
use colloquy_memory::MemoryEntry;

/// System prompt grounding the speaker in persona, topic and retrieved memory.
pub fn speak_system(name: &str, persona: &str, topic: &str, memories: &[MemoryEntry]) -> String {
    let mut out = format!(
        "You are {} in a group conversation about \"{}\".\nPersona: {}\n",
        name, topic, persona
    );
    if !memories.is_empty() {
        out.push_str("Relevant memories:\n");
        for m in memories {
            out.push_str(&format!("- {}\n", m.content));
        }
    }
    out.push_str("Reply in character with one or two conversational sentences.");
    out
}

/// User prompt: the recent transcript tail plus the speaker cue.
pub fn speak_user(transcript_tail: &[Utterance], name: &str) -> String {
    let mut out = String::new();
    for u in transcript_tail {
        out.push_str(&format!("{}: {}\n", u.speaker_name, u.text));
    }
    out.push_str(&format!("{}:", name));
    out
}

/// System prompt for interpreting a freshly committed utterance: context is
/// the transcript tail as it stood before the utterance was spoken.
pub fn interpret_system(name: &str, transcript_tail: &[Utterance]) -> String {
    let mut out = format!(
        "You are {} in a group conversation. The last few lines were:\n",
        name
    );
    for u in transcript_tail {
        out.push_str(&format!("{}: {}\n", u.speaker_name, u.text));
    }
    out.push_str(&format!(
        "Interpret what {} just said in this context and what {} might be \
         thinking. Be as succinct as possible; use a single sentence.",
        name, name
    ));
    out
}

pub fn interpret_user(name: &str, text: &str) -> String {
    format!("Utterance: {}: {}\nInterpretation:", name, text)
}

/// System prompt for the deliberate route's reflection step.
pub fn reflect_system(name: &str, persona: &str) -> String {
    format!(
        "You are {}. Persona: {}\nReflect privately on the conversation so far. \
         State, in a single sentence, what you are thinking right now.",
        name, persona
    )
}

pub fn reflect_user(transcript_tail: &[Utterance]) -> String {
    let mut out = String::from("Conversation so far:\n");
    for u in transcript_tail {
        out.push_str(&format!("{}: {}\n", u.speaker_name, u.text));
    }
    out.push_str("Thought:");
    out
}
