//! The program encoding: one line of comma-separated base-10 signed words.

use std::str::FromStr;

use crate::vm::errors::ProgramError;

/// An executable program: the flat word sequence a machine loads into
/// memory at address zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program(Vec<i64>);

impl Program {
    /// Wraps an already-decoded word sequence.
    pub fn new(words: Vec<i64>) -> Self {
        Self(words)
    }

    /// The words in load order.
    pub fn words(&self) -> &[i64] {
        &self.0
    }

    /// Number of words.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the program holds no words.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<i64>> for Program {
    fn from(words: Vec<i64>) -> Self {
        Self(words)
    }
}

impl FromStr for Program {
    type Err = ProgramError;

    /// Parses the documented encoding: comma-separated base-10 signed
    /// integers with no whitespace inside fields and an optional trailing
    /// newline.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Err(ProgramError::Empty);
        }
        line.split(',')
            .enumerate()
            .map(|(index, field)| {
                field
                    .parse::<i64>()
                    .map_err(|source| ProgramError::InvalidWord { index, source })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_signed_words() {
        let program: Program = "1,-2,0,1125899906842624".parse().unwrap();
        assert_eq!(program.words(), &[1, -2, 0, 1125899906842624]);
    }

    #[test]
    fn accepts_trailing_newline() {
        let program: Program = "1,0,0,0,99\n".parse().unwrap();
        assert_eq!(program.len(), 5);
    }

    #[test]
    fn reports_bad_word_position() {
        let err = "1,x,2".parse::<Program>().unwrap_err();
        assert!(matches!(err, ProgramError::InvalidWord { index: 1, .. }));
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(
            "\n".parse::<Program>(),
            Err(ProgramError::Empty)
        ));
    }
}
