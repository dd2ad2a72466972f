//! Token-driven word assembly
//!
//! A pure reducer: each glove token updates the word buffer and reports what
//! happened. Dispatch itself is left to the caller; the machine only clears
//! the buffer and hands back the word that was in it.

use tracing::trace;

const PHRASE_PREFIX: &str = "PHRASE:";
const BACK: &str = "BACK";
const SPACE: &str = "SPACE";

/// What a single token did to the buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Token not recognized; buffer unchanged
    Ignored,
    /// One letter appended
    Appended(char),
    /// Last character removed (`false` when the buffer was already empty)
    Erased(bool),
    /// Buffer replaced by a phrase
    Overwritten,
    /// `SPACE`: buffer cleared; the word it held should be spoken
    Dispatch { word: String },
}

/// Word buffer for one session
///
/// Soft states: idle when the buffer is empty, accumulating otherwise.
#[derive(Debug, Default, Clone)]
pub struct InputMachine {
    word: String,
}

impl InputMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contents of the buffer
    pub fn word(&self) -> &str {
        &self.word
    }

    pub fn is_idle(&self) -> bool {
        self.word.is_empty()
    }

    /// Apply one raw glove token
    pub fn apply(&mut self, token: &str) -> Transition {
        let raw = token.trim();
        let upper = raw.to_uppercase();

        let transition = if let Some(rest) = phrase_text(raw, &upper) {
            self.word = rest.to_string();
            Transition::Overwritten
        } else if upper == BACK {
            Transition::Erased(self.word.pop().is_some())
        } else if upper == SPACE {
            Transition::Dispatch {
                word: std::mem::take(&mut self.word),
            }
        } else if let Some(letter) = single_letter(&upper) {
            self.word.push(letter);
            Transition::Appended(letter)
        } else {
            Transition::Ignored
        };

        trace!(token = raw, ?transition, word = %self.word, "token applied");
        transition
    }
}

/// Phrase text with its original case, if the token is a phrase command
fn phrase_text<'a>(raw: &'a str, upper: &str) -> Option<&'a str> {
    if !upper.starts_with(PHRASE_PREFIX) {
        return None;
    }
    let rest = match raw.get(..PHRASE_PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(PHRASE_PREFIX) => &raw[PHRASE_PREFIX.len()..],
        // Non-ASCII characters that upper-case into the prefix (e.g. `ſ`)
        _ => {
            let skip = raw
                .char_indices()
                .nth(PHRASE_PREFIX.len())
                .map_or(raw.len(), |(i, _)| i);
            &raw[skip..]
        }
    };
    Some(rest.trim())
}

fn single_letter(upper: &str) -> Option<char> {
    let mut chars = upper.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_uppercase() => Some(c),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(machine: &mut InputMachine, tokens: &[&str]) -> Vec<Transition> {
        tokens.iter().map(|t| machine.apply(t)).collect()
    }

    #[test]
    fn test_initial_state() {
        let machine = InputMachine::new();
        assert!(machine.is_idle());
        assert_eq!(machine.word(), "");
    }

    #[test]
    fn test_letters_concatenate_in_order() {
        let mut machine = InputMachine::new();
        feed(&mut machine, &["H", "E", "L", "L", "O"]);
        assert_eq!(machine.word(), "HELLO");
        assert!(!machine.is_idle());
    }

    #[test]
    fn test_lowercase_letters_are_uppercased() {
        let mut machine = InputMachine::new();
        assert_eq!(machine.apply(" h "), Transition::Appended('H'));
        assert_eq!(machine.word(), "H");
    }

    #[test]
    fn test_back_on_empty_is_noop() {
        let mut machine = InputMachine::new();
        assert_eq!(machine.apply("BACK"), Transition::Erased(false));
        assert_eq!(machine.word(), "");
    }

    #[test]
    fn test_back_removes_last_char() {
        let mut machine = InputMachine::new();
        feed(&mut machine, &["A", "B", "C"]);
        assert_eq!(machine.apply("back"), Transition::Erased(true));
        assert_eq!(machine.word(), "AB");
    }

    #[test]
    fn test_phrase_overwrites_and_keeps_case() {
        let mut machine = InputMachine::new();
        feed(&mut machine, &["X", "Y"]);
        assert_eq!(machine.apply("PHRASE: thank you "), Transition::Overwritten);
        assert_eq!(machine.word(), "thank you");

        machine.apply("phrase:Good Morning");
        assert_eq!(machine.word(), "Good Morning");
    }

    #[test]
    fn test_phrase_prefix_with_non_ascii_lookalike() {
        let mut machine = InputMachine::new();
        assert_eq!(machine.apply("phra\u{17f}e:hello"), Transition::Overwritten);
        assert_eq!(machine.word(), "hello");
    }

    #[test]
    fn test_empty_phrase_clears() {
        let mut machine = InputMachine::new();
        feed(&mut machine, &["A", "PHRASE:   "]);
        assert_eq!(machine.word(), "");
    }

    #[test]
    fn test_letters_append_after_phrase() {
        let mut machine = InputMachine::new();
        feed(&mut machine, &["PHRASE: hi", "A"]);
        assert_eq!(machine.word(), "hiA");
    }

    #[test]
    fn test_space_always_clears() {
        let mut machine = InputMachine::new();
        feed(&mut machine, &["H", "I"]);
        assert_eq!(
            machine.apply("SPACE"),
            Transition::Dispatch {
                word: "HI".to_string()
            }
        );
        assert!(machine.is_idle());

        assert_eq!(
            machine.apply("SPACE"),
            Transition::Dispatch {
                word: String::new()
            }
        );
        assert!(machine.is_idle());
    }

    #[test]
    fn test_unrecognized_tokens_are_ignored() {
        let mut machine = InputMachine::new();
        machine.apply("A");
        for token in ["", "   ", "HELLO", "1", "?", "É", "SPACEBAR", "PHRASE"] {
            assert_eq!(machine.apply(token), Transition::Ignored, "token {:?}", token);
        }
        assert_eq!(machine.word(), "A");
    }

    #[test]
    fn test_back_then_dispatch() {
        let mut machine = InputMachine::new();
        let transitions = feed(&mut machine, &["H", "BACK", "E", "L", "SPACE"]);
        assert_eq!(
            transitions.last(),
            Some(&Transition::Dispatch {
                word: "EL".to_string()
            })
        );
        assert!(machine.is_idle());
    }
}
