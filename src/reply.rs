//! Question/answer pairs out of free-text model replies.
//!
//! The model is asked for `Q:` / `A:` prefixed pairs but does not always
//! comply. The scanner walks the reply once with three states:
//!
//! * `SeekQ` skips to the next `Q:` marker; text before the first marker
//!   is discarded.
//! * `SeekA` looks for the `A:` that closes the question. Hitting another
//!   `Q:` or the end first means the pair has no answer.
//! * `Emit` takes the answer up to the next `Q:`. A second `A:` in that
//!   span makes the pair ambiguous.
//!
//! Malformed pairs are skipped and counted; scanning resumes at the next
//! `Q:`.

use serde::Serialize;
use tracing::debug;

use crate::generation::GenerationReply;

const QUESTION: &str = "Q:";
const ANSWER: &str = "A:";

/// One instruction-tuning record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QaRecord {
    pub instruction: String,
    pub input: String,
    pub output: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingAnswer,
    AmbiguousAnswer,
    EmptyAnswer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    SeekQ,
    SeekA { question: usize },
    Emit { question: usize, answer: usize },
    Done,
}

/// Lazy iterator over the records in one reply.
#[derive(Debug, Clone)]
pub struct QaPairs<'a> {
    content: &'a str,
    cursor: usize,
    state: State,
    skipped: usize,
}

/// Parse a reply into records. A failed reply yields nothing.
pub fn parse_reply(reply: &GenerationReply) -> QaPairs<'_> {
    match reply.content() {
        Some(content) => parse_content(content),
        None => QaPairs {
            content: "",
            cursor: 0,
            state: State::Done,
            skipped: 0,
        },
    }
}

/// Parse raw reply text into records.
pub fn parse_content(content: &str) -> QaPairs<'_> {
    QaPairs {
        content: content.trim(),
        cursor: 0,
        state: State::SeekQ,
        skipped: 0,
    }
}

impl<'a> QaPairs<'a> {
    /// Malformed pairs seen so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn find_marker(&self, marker: &str, from: usize) -> Option<usize> {
        self.content[from..].find(marker).map(|i| from + i)
    }

    fn skip(&mut self, reason: SkipReason, resume: Option<usize>) {
        debug!(?reason, offset = self.cursor, "skipping malformed pair");
        self.skipped += 1;
        self.state = match resume {
            Some(at) => {
                self.cursor = at;
                State::SeekQ
            }
            None => State::Done,
        };
    }
}

impl<'a> Iterator for QaPairs<'a> {
    type Item = QaRecord;

    fn next(&mut self) -> Option<QaRecord> {
        loop {
            match self.state {
                State::Done => return None,
                State::SeekQ => match self.find_marker(QUESTION, self.cursor) {
                    Some(at) => {
                        self.cursor = at + QUESTION.len();
                        self.state = State::SeekA {
                            question: self.cursor,
                        };
                    }
                    None => self.state = State::Done,
                },
                State::SeekA { question } => {
                    let next_q = self.find_marker(QUESTION, self.cursor);
                    match self.find_marker(ANSWER, self.cursor) {
                        Some(a) if next_q.map_or(true, |q| a < q) => {
                            self.cursor = a + ANSWER.len();
                            self.state = State::Emit {
                                question,
                                answer: self.cursor,
                            };
                        }
                        _ => self.skip(SkipReason::MissingAnswer, next_q),
                    }
                }
                State::Emit { question, answer } => {
                    let next_q = self.find_marker(QUESTION, answer);
                    let end = next_q.unwrap_or(self.content.len());
                    if self.content[answer..end].contains(ANSWER) {
                        self.skip(SkipReason::AmbiguousAnswer, next_q);
                        continue;
                    }

                    let q_text = self.content[question..answer - ANSWER.len()].trim();
                    let a_text = self.content[answer..end].trim();
                    if a_text.is_empty() {
                        self.skip(SkipReason::EmptyAnswer, next_q);
                        continue;
                    }

                    match next_q {
                        Some(at) => {
                            self.cursor = at;
                            self.state = State::SeekQ;
                        }
                        None => self.state = State::Done,
                    }
                    return Some(QaRecord {
                        instruction: q_text.to_string(),
                        input: String::new(),
                        output: a_text.to_string(),
                    });
                }
            }
        }
    }
}

impl std::iter::FusedIterator for QaPairs<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::ReplyFailure;

    fn records(content: &str) -> Vec<QaRecord> {
        parse_content(content).collect()
    }

    #[test]
    fn trailing_malformed_segment_is_dropped() {
        let mut pairs = parse_content("Q: What is X?\nA: X is Y.\nQ: malformed");
        let first = pairs.next().unwrap();
        assert_eq!(first.instruction, "What is X?");
        assert_eq!(first.input, "");
        assert_eq!(first.output, "X is Y.");
        assert!(pairs.next().is_none());
        assert_eq!(pairs.skipped(), 1);
    }

    #[test]
    fn five_pairs() {
        let content = (1..=5)
            .map(|i| format!("Q: Question {}?\nA: Answer {}.\n\n", i, i))
            .collect::<String>();
        let out = records(&content);
        assert_eq!(out.len(), 5);
        assert_eq!(out[4].instruction, "Question 5?");
        assert_eq!(out[4].output, "Answer 5.");
    }

    #[test]
    fn preamble_is_discarded() {
        let out = records("Sure! A: here you go.\n\nQ: Why?\nA: Because.");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].instruction, "Why?");
    }

    #[test]
    fn ambiguous_pair_is_skipped() {
        let mut pairs = parse_content("Q: one?\nA: first A: second\nQ: two?\nA: fine");
        let out: Vec<_> = pairs.by_ref().collect();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].instruction, "two?");
        assert_eq!(pairs.skipped(), 1);
    }

    #[test]
    fn question_without_answer_then_good_pair() {
        let out = records("Q: lonely?\nQ: paired?\nA: yes");
        assert_eq!(
            out,
            vec![QaRecord {
                instruction: "paired?".into(),
                input: String::new(),
                output: "yes".into(),
            }]
        );
    }

    #[test]
    fn empty_answer_is_not_emitted() {
        let mut pairs = parse_content("Q: blank?\nA:   \nQ: full?\nA: ok");
        let out: Vec<_> = pairs.by_ref().collect();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].output, "ok");
        assert_eq!(pairs.skipped(), 1);
    }

    #[test]
    fn no_markers_yields_nothing() {
        let mut pairs = parse_content("I cannot help with that.");
        assert!(pairs.next().is_none());
        assert_eq!(pairs.skipped(), 0);
    }

    #[test]
    fn multiline_answer_is_trimmed() {
        let out = records("Q: List?\nA: first line\nsecond line\n");
        assert_eq!(out[0].output, "first line\nsecond line");
    }

    #[test]
    fn failed_reply_is_empty() {
        let reply = GenerationReply::Failed(ReplyFailure::HttpError { status: 500 });
        assert_eq!(parse_reply(&reply).count(), 0);
    }

    #[test]
    fn successful_reply_is_parsed() {
        let reply = GenerationReply::Success {
            raw_content: "  Q: a?\nA: b  ".to_string(),
        };
        let out: Vec<_> = parse_reply(&reply).collect();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].output, "b");
    }
}
