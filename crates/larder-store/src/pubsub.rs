//! Pattern pub/sub primitives shared by every backend.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::StoreResult;

/// One message delivered by a pattern subscription.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    /// The channel the message was published on.
    pub channel: String,
    /// The subscription pattern that matched `channel`.
    pub pattern: String,
    pub payload: Bytes,
}

/// An ordered stream of messages from a pattern subscription.
///
/// The subscription is live as soon as the backend returns it, but the server
/// side may lag behind on a networked backend. A stream item of `Err` reports
/// a transport failure; the stream ending (`None`) means the connection closed.
#[derive(Debug)]
pub struct Subscription {
    pattern: String,
    rx: mpsc::UnboundedReceiver<StoreResult<Message>>,
}

impl Subscription {
    /// Create a subscription together with the sender a backend feeds it from.
    pub fn channel(
        pattern: impl Into<String>,
    ) -> (mpsc::UnboundedSender<StoreResult<Message>>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            tx,
            Self {
                pattern: pattern.into(),
                rx,
            },
        )
    }

    /// The pattern this subscription was opened with.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Wait for the next message.
    pub async fn next(&mut self) -> Option<StoreResult<Message>> {
        self.rx.recv().await
    }

    /// Take the next message if one is already buffered.
    pub fn try_next(&mut self) -> Option<StoreResult<Message>> {
        self.rx.try_recv().ok()
    }
}

/// Match `text` against a glob-style channel pattern.
///
/// Supports `*` (any run of characters), `?` (any single character),
/// `[abc]` / `[a-z]` / `[^a]` classes, and `\` to escape the next character.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    match_from(&pattern, &text)
}

fn match_from(pattern: &[char], text: &[char]) -> bool {
    let (mut p, mut t) = (0, 0);
    // Position to resume from after the most recent `*`.
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() {
            match pattern[p] {
                '*' => {
                    backtrack = Some((p, t));
                    p += 1;
                    continue;
                }
                '?' => {
                    p += 1;
                    t += 1;
                    continue;
                }
                '[' => {
                    if let Some((matched, next)) = match_class(pattern, p, text[t]) {
                        if matched {
                            p = next;
                            t += 1;
                            continue;
                        }
                    } else if text[t] == '[' {
                        // Unterminated class: treat `[` literally.
                        p += 1;
                        t += 1;
                        continue;
                    }
                }
                '\\' if p + 1 < pattern.len() => {
                    if pattern[p + 1] == text[t] {
                        p += 2;
                        t += 1;
                        continue;
                    }
                }
                c => {
                    if c == text[t] {
                        p += 1;
                        t += 1;
                        continue;
                    }
                }
            }
        }

        match backtrack {
            Some((star, consumed)) => {
                p = star + 1;
                t = consumed + 1;
                backtrack = Some((star, consumed + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// Evaluate a `[...]` class starting at `pattern[start]`.
///
/// Returns whether `c` matched and the index just past the closing `]`, or
/// `None` if the class is never closed.
fn match_class(pattern: &[char], start: usize, c: char) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negate = i < pattern.len() && pattern[i] == '^';
    if negate {
        i += 1;
    }

    let mut matched = false;
    while i < pattern.len() && pattern[i] != ']' {
        if pattern[i] == '\\' && i + 1 < pattern.len() {
            matched |= pattern[i + 1] == c;
            i += 2;
        } else if i + 2 < pattern.len() && pattern[i + 1] == '-' && pattern[i + 2] != ']' {
            let (lo, hi) = if pattern[i] <= pattern[i + 2] {
                (pattern[i], pattern[i + 2])
            } else {
                (pattern[i + 2], pattern[i])
            };
            matched |= lo <= c && c <= hi;
            i += 3;
        } else {
            matched |= pattern[i] == c;
            i += 1;
        }
    }

    if i >= pattern.len() {
        return None;
    }
    Some((matched != negate, i + 1))
}
