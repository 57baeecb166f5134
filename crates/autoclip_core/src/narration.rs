/// Sentence terminators for narration scripts.
const TERMINATORS: [char; 4] = ['。', '！', '？', '\n'];

/// Split a script into sentences, keeping each terminator with its sentence.
/// Blank pieces are dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch != '\n' {
            current.push(ch);
        }
        if TERMINATORS.contains(&ch) {
            push_trimmed(&mut sentences, &current);
            current.clear();
        }
    }
    push_trimmed(&mut sentences, &current);
    sentences
}

fn push_trimmed(out: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        out.push(piece.to_string());
    }
}
