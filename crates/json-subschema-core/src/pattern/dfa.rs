//! Deterministic automata over the symbolic alphabet.
//!
//! Built by subset construction from the Thompson NFA. All DFAs here are
//! complete (every state has a transition for every atomic class), which
//! makes complement a flip of the accept mask and containment a product
//! walk. Derived automata are rendered back to pattern text by GNFA state
//! elimination so lattice results can serialize to a `pattern` keyword.

use std::collections::{BTreeSet, HashMap, VecDeque};

use super::class::{ClassSet, Partition};
use super::parse::Nfa;
use super::PatternError;

/// Subset construction can blow up exponentially; refuse past this point
/// rather than answer slowly or wrongly.
const MAX_STATES: usize = 4096;

#[derive(Debug, Clone)]
pub(crate) struct Dfa {
    partition: Partition,
    /// `trans[s][class_id]` = target state. Complete by construction.
    trans: Vec<Vec<usize>>,
    accept: Vec<bool>,
    start: usize,
}

impl Dfa {
    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    pub fn from_nfa(nfa: &Nfa) -> Result<Dfa, PatternError> {
        let partition = Partition::from_labels(nfa.labels());

        // Per NFA state: class id -> target NFA states.
        let mut moves: Vec<HashMap<usize, Vec<usize>>> = vec![HashMap::new(); nfa.states.len()];
        for (s, state) in nfa.states.iter().enumerate() {
            for (set, to) in &state.trans {
                for atom in partition.atoms_of(set) {
                    moves[s].entry(atom).or_default().push(*to);
                }
            }
        }

        let closure = |seed: &[usize]| -> BTreeSet<usize> {
            let mut set: BTreeSet<usize> = seed.iter().copied().collect();
            let mut stack: Vec<usize> = seed.to_vec();
            while let Some(s) = stack.pop() {
                for &e in &nfa.states[s].eps {
                    if set.insert(e) {
                        stack.push(e);
                    }
                }
            }
            set
        };

        let start_set = closure(&[nfa.start]);
        let mut ids: HashMap<BTreeSet<usize>, usize> = HashMap::new();
        let mut sets: Vec<BTreeSet<usize>> = Vec::new();
        let mut trans: Vec<Vec<usize>> = Vec::new();

        ids.insert(start_set.clone(), 0);
        sets.push(start_set);
        let mut queue: VecDeque<usize> = VecDeque::from([0]);

        while let Some(id) = queue.pop_front() {
            let mut row = Vec::with_capacity(partition.len());
            for class in 0..partition.len() {
                let mut seed: Vec<usize> = Vec::new();
                for &s in &sets[id] {
                    if let Some(targets) = moves[s].get(&class) {
                        seed.extend_from_slice(targets);
                    }
                }
                let next = closure(&seed);
                let next_id = match ids.get(&next) {
                    Some(&n) => n,
                    None => {
                        let n = sets.len();
                        if n >= MAX_STATES {
                            return Err(PatternError::Unsupported(format!(
                                "automaton exceeds {} states",
                                MAX_STATES
                            )));
                        }
                        ids.insert(next.clone(), n);
                        sets.push(next);
                        trans.push(Vec::new());
                        queue.push_back(n);
                        n
                    }
                };
                row.push(next_id);
            }
            if trans.len() <= id {
                trans.resize(id + 1, Vec::new());
            }
            trans[id] = row;
        }

        let accept = sets.iter().map(|set| set.contains(&nfa.accept)).collect();
        Ok(Dfa {
            partition,
            trans,
            accept,
            start: 0,
        })
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn accepts(&self, input: &str) -> bool {
        let mut state = self.start;
        for c in input.chars() {
            let class = self.partition.class_of(c);
            state = self.trans[state][class];
        }
        self.accept[state]
    }

    /// Is the accepted language empty?
    pub fn is_empty(&self) -> bool {
        let mut seen = vec![false; self.trans.len()];
        let mut stack = vec![self.start];
        seen[self.start] = true;
        while let Some(s) = stack.pop() {
            if self.accept[s] {
                return false;
            }
            for &t in &self.trans[s] {
                if !seen[t] {
                    seen[t] = true;
                    stack.push(t);
                }
            }
        }
        true
    }

    /// `L(self) ⊆ L(other)`: emptiness of `self ∩ ¬other`.
    pub fn is_subset(&self, other: &Dfa) -> bool {
        Dfa::product(self, other, |a, b| a && !b).is_empty()
    }

    pub fn is_equivalent(&self, other: &Dfa) -> bool {
        Dfa::product(self, other, |a, b| a != b).is_empty()
    }

    /// Range of word lengths the language achieves: `None` when empty,
    /// otherwise `(shortest, longest)` with `longest = None` for unbounded.
    /// The range over-approximates the achievable length set (e.g. `(aa)*`
    /// reports `0..∞` though only even lengths occur).
    pub fn accept_len_range(&self) -> Option<(u64, Option<u64>)> {
        let n = self.trans.len();

        // Co-reachable: states from which an accepting state is reachable.
        let mut rev: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (s, row) in self.trans.iter().enumerate() {
            for &t in row {
                rev[t].push(s);
            }
        }
        let mut useful = vec![false; n];
        let mut stack: Vec<usize> = (0..n).filter(|&s| self.accept[s]).collect();
        for &s in &stack {
            useful[s] = true;
        }
        while let Some(s) = stack.pop() {
            for &p in &rev[s] {
                if !useful[p] {
                    useful[p] = true;
                    stack.push(p);
                }
            }
        }
        if !useful[self.start] {
            return None;
        }

        // Shortest accepted word: BFS over useful states.
        let mut dist = vec![u64::MAX; n];
        dist[self.start] = 0;
        let mut queue = VecDeque::from([self.start]);
        let mut shortest = None;
        while let Some(s) = queue.pop_front() {
            if self.accept[s] && shortest.is_none() {
                shortest = Some(dist[s]);
            }
            for &t in &self.trans[s] {
                if useful[t] && dist[t] == u64::MAX {
                    dist[t] = dist[s] + 1;
                    queue.push_back(t);
                }
            }
        }
        let shortest = shortest.expect("start is co-reachable");

        // Longest: unbounded iff a cycle exists among useful reachable
        // states; otherwise the longest path to an accepting state.
        let mut reachable = vec![false; n];
        let mut stack = vec![self.start];
        reachable[self.start] = true;
        while let Some(s) = stack.pop() {
            for &t in &self.trans[s] {
                if useful[t] && !reachable[t] {
                    reachable[t] = true;
                    stack.push(t);
                }
            }
        }
        let live = |s: usize| useful[s] && reachable[s];

        // Longest path over the trimmed graph. Every live state is
        // co-reachable, so its longest value is well defined; any cycle
        // among live states means unbounded lengths.
        let mut color = vec![0u8; n]; // 0 white, 1 gray, 2 black
        let mut longest_from = vec![0u64; n];
        fn dfs(
            s: usize,
            trans: &[Vec<usize>],
            accept: &[bool],
            live: &dyn Fn(usize) -> bool,
            color: &mut [u8],
            longest_from: &mut [u64],
        ) -> Option<()> {
            color[s] = 1;
            let mut best = 0u64; // accept[s] contributes a path of length 0
            let mut any = accept[s];
            for &t in &trans[s] {
                if !live(t) {
                    continue;
                }
                match color[t] {
                    1 => return None, // cycle → unbounded
                    0 => dfs(t, trans, accept, live, color, longest_from)?,
                    _ => {}
                }
                best = best.max(longest_from[t] + 1);
                any = true;
            }
            debug_assert!(any, "live states are co-reachable");
            longest_from[s] = best;
            color[s] = 2;
            Some(())
        }

        match dfs(
            self.start,
            &self.trans,
            &self.accept,
            &live,
            &mut color,
            &mut longest_from,
        ) {
            None => Some((shortest, None)),
            Some(()) => Some((shortest, Some(longest_from[self.start]))),
        }
    }

    // -----------------------------------------------------------------------
    // Boolean closure
    // -----------------------------------------------------------------------

    pub fn complement(&self) -> Dfa {
        Dfa {
            partition: self.partition.clone(),
            trans: self.trans.clone(),
            accept: self.accept.iter().map(|a| !a).collect(),
            start: self.start,
        }
    }

    pub fn intersect(&self, other: &Dfa) -> Dfa {
        Dfa::product(self, other, |a, b| a && b)
    }

    pub fn union(&self, other: &Dfa) -> Dfa {
        Dfa::product(self, other, |a, b| a || b)
    }

    pub fn difference(&self, other: &Dfa) -> Dfa {
        Dfa::product(self, other, |a, b| a && !b)
    }

    /// Product over the common refinement of both partitions, keeping only
    /// reachable pairs. `f` combines accept bits.
    fn product(a: &Dfa, b: &Dfa, f: impl Fn(bool, bool) -> bool) -> Dfa {
        let partition = Partition::refine(&a.partition, &b.partition);

        // Map each refined class to the original class on either side via a
        // representative scalar.
        let a_class: Vec<usize> = (0..partition.len())
            .map(|id| a.partition.class_of_scalar(partition.atom(id).0))
            .collect();
        let b_class: Vec<usize> = (0..partition.len())
            .map(|id| b.partition.class_of_scalar(partition.atom(id).0))
            .collect();

        let mut ids: HashMap<(usize, usize), usize> = HashMap::new();
        let mut pairs: Vec<(usize, usize)> = Vec::new();
        let mut trans: Vec<Vec<usize>> = Vec::new();

        ids.insert((a.start, b.start), 0);
        pairs.push((a.start, b.start));
        let mut queue: VecDeque<usize> = VecDeque::from([0]);

        while let Some(id) = queue.pop_front() {
            let (sa, sb) = pairs[id];
            let mut row = Vec::with_capacity(partition.len());
            for class in 0..partition.len() {
                let pair = (a.trans[sa][a_class[class]], b.trans[sb][b_class[class]]);
                let next_id = *ids.entry(pair).or_insert_with(|| {
                    pairs.push(pair);
                    trans.push(Vec::new());
                    queue.push_back(pairs.len() - 1);
                    pairs.len() - 1
                });
                row.push(next_id);
            }
            if trans.len() <= id {
                trans.resize(id + 1, Vec::new());
            }
            trans[id] = row;
        }

        let accept = pairs
            .iter()
            .map(|&(sa, sb)| f(a.accept[sa], b.accept[sb]))
            .collect();
        Dfa {
            partition,
            trans,
            accept,
            start: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Rendering (GNFA state elimination)
    // -----------------------------------------------------------------------

    /// Render the accepted language as an unanchored full-match regex core.
    ///
    /// The output uses only dialect constructs (classes, concatenation,
    /// alternation, star), so it survives a round trip through
    /// [`Nfa::parse`]. Callers anchor it for display.
    pub fn to_source(&self) -> String {
        if self.is_empty() {
            // No dialect regex denotes the empty language; atoms carrying
            // one are unsatisfiable and collapse before serialization, so
            // this sentinel is display-only and must not be re-parsed.
            return "[^\\s\\S]".to_string();
        }

        let n = self.trans.len();
        let gstart = n;
        let gfinal = n + 1;
        let mut edges: Vec<Vec<Re>> = vec![vec![Re::Empty; n + 2]; n + 2];

        for (s, row) in self.trans.iter().enumerate() {
            // Group classes by target so each edge is one merged ClassSet.
            // BTreeMap keeps the construction deterministic.
            let mut by_target: std::collections::BTreeMap<usize, Vec<usize>> =
                std::collections::BTreeMap::new();
            for (class, &t) in row.iter().enumerate() {
                by_target.entry(t).or_default().push(class);
            }
            for (t, classes) in by_target {
                let set = self.partition.set_of(&classes);
                edges[s][t] = Re::alt(edges[s][t].clone(), Re::class(set));
            }
        }

        edges[gstart][self.start] = Re::Eps;
        for (s, &acc) in self.accept.iter().enumerate() {
            if acc {
                edges[s][gfinal] = Re::alt(edges[s][gfinal].clone(), Re::Eps);
            }
        }

        // Eliminate interior states one at a time.
        for s in 0..n {
            let own_loop = Re::star(edges[s][s].clone());
            let incoming: Vec<usize> = (0..n + 2)
                .filter(|&p| p != s && !matches!(edges[p][s], Re::Empty))
                .collect();
            let outgoing: Vec<usize> = (0..n + 2)
                .filter(|&q| q != s && !matches!(edges[s][q], Re::Empty))
                .collect();
            for &p in &incoming {
                for &q in &outgoing {
                    let through = Re::concat(vec![
                        edges[p][s].clone(),
                        own_loop.clone(),
                        edges[s][q].clone(),
                    ]);
                    edges[p][q] = Re::alt(edges[p][q].clone(), through);
                }
            }
            for p in 0..n + 2 {
                edges[p][s] = Re::Empty;
                edges[s][p] = Re::Empty;
            }
        }

        edges[gstart][gfinal].render(Prec::Alt)
    }
}

// ---------------------------------------------------------------------------
// Regex AST for rendering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Re {
    /// Matches nothing (absent edge).
    Empty,
    /// Matches the empty string.
    Eps,
    Class(ClassSet),
    Concat(Vec<Re>),
    Alt(Vec<Re>),
    Star(Box<Re>),
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Prec {
    Alt,
    Concat,
    Atom,
}

impl Re {
    fn class(set: ClassSet) -> Re {
        if set.is_empty() {
            Re::Empty
        } else {
            Re::Class(set)
        }
    }

    fn alt(a: Re, b: Re) -> Re {
        match (a, b) {
            (Re::Empty, x) | (x, Re::Empty) => x,
            (Re::Alt(mut xs), Re::Alt(ys)) => {
                for y in ys {
                    if !xs.contains(&y) {
                        xs.push(y);
                    }
                }
                Re::Alt(xs)
            }
            (Re::Alt(mut xs), y) => {
                if !xs.contains(&y) {
                    xs.push(y);
                }
                Re::Alt(xs)
            }
            (x, Re::Alt(mut ys)) => {
                if !ys.contains(&x) {
                    ys.insert(0, x);
                }
                Re::Alt(ys)
            }
            (x, y) if x == y => x,
            // Merge sibling classes into one.
            (Re::Class(x), Re::Class(y)) => Re::Class(x.union(&y)),
            (x, y) => Re::Alt(vec![x, y]),
        }
    }

    fn concat(parts: Vec<Re>) -> Re {
        let mut out = Vec::new();
        for p in parts {
            match p {
                Re::Empty => return Re::Empty,
                Re::Eps => {}
                Re::Concat(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        match out.len() {
            0 => Re::Eps,
            1 => out.into_iter().next().expect("len checked"),
            _ => Re::Concat(out),
        }
    }

    fn star(inner: Re) -> Re {
        match inner {
            Re::Empty | Re::Eps => Re::Eps,
            Re::Star(x) => Re::Star(x),
            other => Re::Star(Box::new(other)),
        }
    }

    fn render(&self, outer: Prec) -> String {
        match self {
            Re::Empty => "[^\\s\\S]".to_string(),
            Re::Eps => String::new(),
            Re::Class(set) => render_class(set),
            Re::Concat(parts) => {
                let body: String = parts.iter().map(|p| p.render(Prec::Concat)).collect();
                group_if(body, Prec::Concat < outer)
            }
            Re::Alt(parts) => {
                // `X|ε` renders as an optional group.
                let (eps, rest): (Vec<_>, Vec<_>) = parts.iter().partition(|p| **p == Re::Eps);
                let body = rest
                    .iter()
                    .map(|p| p.render(Prec::Alt))
                    .collect::<Vec<_>>()
                    .join("|");
                if !eps.is_empty() {
                    if rest.is_empty() {
                        return String::new();
                    }
                    return format!("(?:{})?", body);
                }
                group_if(body, Prec::Alt < outer)
            }
            Re::Star(inner) => format!("{}*", inner.render(Prec::Atom)),
        }
    }
}

fn group_if(body: String, needed: bool) -> String {
    if needed {
        format!("(?:{})", body)
    } else {
        body
    }
}

// ---------------------------------------------------------------------------
// Class rendering
// ---------------------------------------------------------------------------

/// The valid Unicode scalar values (surrogates excluded). Complement sets
/// computed over the raw alphabet are clipped to this before rendering,
/// since `\u{...}` escapes reject surrogates.
fn valid_scalars() -> ClassSet {
    ClassSet::from_ranges([(0, 0xD7FF), (0xE000, 0x10_FFFF)])
}

fn render_class(set: &ClassSet) -> String {
    let clipped = ClassSet::from_ranges(
        set.ranges()
            .iter()
            .flat_map(|&(lo, hi)| clip_range(lo, hi))
            .collect::<Vec<_>>(),
    );

    if clipped == valid_scalars() {
        return "[\\s\\S]".to_string();
    }
    // Single character renders bare.
    if clipped.len() == 1 {
        let c = char::from_u32(clipped.ranges()[0].0).expect("clipped to valid scalars");
        return escape_literal(c);
    }
    // Prefer the negated form when it is substantially smaller.
    let negated = ClassSet::from_ranges(
        clipped
            .complement()
            .ranges()
            .iter()
            .flat_map(|&(lo, hi)| clip_range(lo, hi))
            .collect::<Vec<_>>(),
    );
    if negated.ranges().len() * 4 < clipped.ranges().len() {
        return format!("[^{}]", render_ranges(&negated));
    }
    format!("[{}]", render_ranges(&clipped))
}

fn clip_range(lo: u32, hi: u32) -> Vec<(u32, u32)> {
    let mut out = Vec::new();
    if lo <= 0xD7FF {
        out.push((lo, hi.min(0xD7FF)));
    }
    if hi >= 0xE000 {
        out.push((lo.max(0xE000), hi));
    }
    out
}

fn render_ranges(set: &ClassSet) -> String {
    let mut out = String::new();
    for &(lo, hi) in set.ranges() {
        if lo == hi {
            out.push_str(&escape_in_class(lo));
        } else if hi == lo + 1 {
            out.push_str(&escape_in_class(lo));
            out.push_str(&escape_in_class(hi));
        } else {
            out.push_str(&escape_in_class(lo));
            out.push('-');
            out.push_str(&escape_in_class(hi));
        }
    }
    out
}

fn escape_in_class(v: u32) -> String {
    match char::from_u32(v) {
        Some(c) if matches!(c, '\\' | ']' | '^' | '-' | '[') => format!("\\{}", c),
        Some(c) if (' '..='~').contains(&c) => c.to_string(),
        _ => format!("\\u{{{:X}}}", v),
    }
}

fn escape_literal(c: char) -> String {
    if matches!(
        c,
        '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '^' | '$'
    ) {
        format!("\\{}", c)
    } else if (' '..='~').contains(&c) {
        c.to_string()
    } else {
        format!("\\u{{{:X}}}", c as u32)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
