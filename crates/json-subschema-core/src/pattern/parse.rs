//! Translation from `regex-syntax` HIR into a Thompson NFA.
//!
//! The supported dialect is whatever survives this translation:
//! concatenation, alternation, star/plus/optional, bounded repetition,
//! character classes, dot, Unicode escapes. Groups are transparent.
//! Anything else (lookaround, backreferences, interior anchors) fails with
//! [`PatternError::Unsupported`] — the engine never guesses.

use regex_syntax::hir::{Class, Hir, HirKind};

use super::class::ClassSet;
use super::PatternError;

/// Expanding `a{1000}`-style repetitions is linear in the bound; cap it so
/// adversarial bounds cannot exhaust memory.
const MAX_REPEAT: u32 = 256;

#[derive(Debug, Default)]
pub(crate) struct NfaState {
    pub eps: Vec<usize>,
    pub trans: Vec<(ClassSet, usize)>,
}

/// A Thompson NFA with a single start and a single accept state.
#[derive(Debug)]
pub(crate) struct Nfa {
    pub states: Vec<NfaState>,
    pub start: usize,
    pub accept: usize,
}

impl Nfa {
    /// Parse a full-match regex (anchors already stripped by the caller)
    /// and compile it.
    pub fn parse(full_match_source: &str) -> Result<Nfa, PatternError> {
        let hir = regex_syntax::Parser::new()
            .parse(full_match_source)
            .map_err(|e| PatternError::Unsupported(e.to_string()))?;

        let mut builder = Builder { states: Vec::new() };
        let (start, accept) = builder.compile(&hir)?;
        Ok(Nfa {
            states: builder.states,
            start,
            accept,
        })
    }

    /// All class labels on transitions, for partition construction.
    pub fn labels(&self) -> impl Iterator<Item = &ClassSet> {
        self.states.iter().flat_map(|s| s.trans.iter().map(|(c, _)| c))
    }
}

struct Builder {
    states: Vec<NfaState>,
}

impl Builder {
    fn push(&mut self) -> usize {
        self.states.push(NfaState::default());
        self.states.len() - 1
    }

    fn eps(&mut self, from: usize, to: usize) {
        self.states[from].eps.push(to);
    }

    /// Compile one HIR node into an (entry, exit) fragment.
    fn compile(&mut self, hir: &Hir) -> Result<(usize, usize), PatternError> {
        match hir.kind() {
            HirKind::Empty => {
                let s = self.push();
                Ok((s, s))
            }
            HirKind::Literal(lit) => {
                let text = std::str::from_utf8(&lit.0)
                    .map_err(|_| PatternError::Unsupported("non-UTF-8 literal".to_string()))?;
                let entry = self.push();
                let mut cur = entry;
                for c in text.chars() {
                    let next = self.push();
                    self.states[cur].trans.push((ClassSet::single(c), next));
                    cur = next;
                }
                Ok((entry, cur))
            }
            HirKind::Class(class) => {
                let set = class_set(class)?;
                if set.is_empty() {
                    return Err(PatternError::Unsupported(
                        "empty character class".to_string(),
                    ));
                }
                let entry = self.push();
                let exit = self.push();
                self.states[entry].trans.push((set, exit));
                Ok((entry, exit))
            }
            HirKind::Look(look) => Err(PatternError::Unsupported(format!(
                "anchor or look-around `{:?}` away from the pattern ends",
                look
            ))),
            HirKind::Repetition(rep) => {
                if rep.min > MAX_REPEAT || rep.max.is_some_and(|m| m > MAX_REPEAT) {
                    return Err(PatternError::Unsupported(format!(
                        "repetition bound exceeds {}",
                        MAX_REPEAT
                    )));
                }
                let entry = self.push();
                let mut cur = entry;

                // Mandatory copies.
                for _ in 0..rep.min {
                    let (sub_entry, sub_exit) = self.compile(&rep.sub)?;
                    self.eps(cur, sub_entry);
                    cur = sub_exit;
                }

                match rep.max {
                    None => {
                        // Kleene tail: loop a final copy.
                        let (sub_entry, sub_exit) = self.compile(&rep.sub)?;
                        let exit = self.push();
                        self.eps(cur, sub_entry);
                        self.eps(cur, exit);
                        self.eps(sub_exit, sub_entry);
                        self.eps(sub_exit, exit);
                        Ok((entry, exit))
                    }
                    Some(max) => {
                        // Optional copies up to the bound.
                        let exit = self.push();
                        for _ in rep.min..max {
                            let (sub_entry, sub_exit) = self.compile(&rep.sub)?;
                            self.eps(cur, sub_entry);
                            self.eps(cur, exit);
                            cur = sub_exit;
                        }
                        self.eps(cur, exit);
                        Ok((entry, exit))
                    }
                }
            }
            // A capture group's extraction semantics are irrelevant to the
            // language it denotes; treat it as plain grouping.
            HirKind::Capture(cap) => self.compile(&cap.sub),
            HirKind::Concat(parts) => {
                let entry = self.push();
                let mut cur = entry;
                for part in parts {
                    let (sub_entry, sub_exit) = self.compile(part)?;
                    self.eps(cur, sub_entry);
                    cur = sub_exit;
                }
                Ok((entry, cur))
            }
            HirKind::Alternation(parts) => {
                let entry = self.push();
                let exit = self.push();
                for part in parts {
                    let (sub_entry, sub_exit) = self.compile(part)?;
                    self.eps(entry, sub_entry);
                    self.eps(sub_exit, exit);
                }
                Ok((entry, exit))
            }
        }
    }
}

fn class_set(class: &Class) -> Result<ClassSet, PatternError> {
    match class {
        Class::Unicode(cls) => Ok(ClassSet::from_ranges(
            cls.ranges()
                .iter()
                .map(|r| (r.start() as u32, r.end() as u32)),
        )),
        Class::Bytes(_) => Err(PatternError::Unsupported(
            "byte-oriented character class".to_string(),
        )),
    }
}

// ===========================================================================
// Tests
// ===========================================================================
