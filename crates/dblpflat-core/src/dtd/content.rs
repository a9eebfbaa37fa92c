//! Element content models and their streaming matchers.
//!
//! Element-only content (`(a, (b | c)*, d?)`) is compiled into a small
//! Thompson automaton. The walker keeps one [`Cursor`] per open element and
//! advances it as each child start tag arrives, so validation needs no
//! look-ahead and no buffered children.

use std::collections::BTreeSet;

/// A content particle of an element-only content model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Particle {
    Name(String),
    Seq(Vec<Particle>),
    Choice(Vec<Particle>),
    Optional(Box<Particle>),
    ZeroOrMore(Box<Particle>),
    OneOrMore(Box<Particle>),
}

/// Declared content of an element.
#[derive(Debug, Clone)]
pub enum ContentModel {
    Empty,
    Any,
    /// `(#PCDATA | a | b)*`: text plus any of the listed children.
    Mixed(Vec<String>),
    /// Element-only content.
    Children(Automaton),
}

/// Matching state for one open element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    Empty,
    Any,
    Mixed,
    Children(BTreeSet<usize>),
}

/// What character data an element may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRule {
    Allowed,
    WhitespaceOnly,
    Forbidden,
}

impl ContentModel {
    pub fn cursor(&self) -> Cursor {
        match self {
            ContentModel::Empty => Cursor::Empty,
            ContentModel::Any => Cursor::Any,
            ContentModel::Mixed(_) => Cursor::Mixed,
            ContentModel::Children(a) => Cursor::Children(a.start_set()),
        }
    }

    /// Advance `cursor` over a child element. Returns `false` if the child
    /// is not allowed at this point.
    pub fn accept_child(&self, cursor: &mut Cursor, name: &str) -> bool {
        match (self, cursor) {
            (ContentModel::Any, _) => true,
            (ContentModel::Empty, _) => false,
            (ContentModel::Mixed(names), _) => names.iter().any(|n| n == name),
            (ContentModel::Children(a), Cursor::Children(states)) => {
                let next = a.step(states, name);
                if next.is_empty() {
                    return false;
                }
                *states = next;
                true
            }
            (ContentModel::Children(_), _) => false,
        }
    }

    /// Whether the content seen so far is complete.
    pub fn accepts_end(&self, cursor: &Cursor) -> bool {
        match (self, cursor) {
            (ContentModel::Children(a), Cursor::Children(states)) => a.is_accepting(states),
            (ContentModel::Children(_), _) => false,
            _ => true,
        }
    }

    pub fn text_rule(&self) -> TextRule {
        match self {
            ContentModel::Any | ContentModel::Mixed(_) => TextRule::Allowed,
            ContentModel::Children(_) => TextRule::WhitespaceOnly,
            ContentModel::Empty => TextRule::Forbidden,
        }
    }
}

#[derive(Debug, Clone)]
enum Edge {
    Epsilon(usize),
    Name(String, usize),
}

/// Nondeterministic automaton over child element names.
#[derive(Debug, Clone)]
pub struct Automaton {
    states: Vec<Vec<Edge>>,
    start: usize,
    accept: usize,
}

impl Automaton {
    pub fn compile(particle: &Particle) -> Self {
        let mut a = Automaton {
            states: Vec::new(),
            start: 0,
            accept: 0,
        };
        let (start, accept) = a.build(particle);
        a.start = start;
        a.accept = accept;
        a
    }

    fn new_state(&mut self) -> usize {
        self.states.push(Vec::new());
        self.states.len() - 1
    }

    fn epsilon(&mut self, from: usize, to: usize) {
        self.states[from].push(Edge::Epsilon(to));
    }

    fn build(&mut self, particle: &Particle) -> (usize, usize) {
        match particle {
            Particle::Name(name) => {
                let s = self.new_state();
                let e = self.new_state();
                self.states[s].push(Edge::Name(name.clone(), e));
                (s, e)
            }
            Particle::Seq(items) => {
                let s = self.new_state();
                let mut tail = s;
                for item in items {
                    let (is, ie) = self.build(item);
                    self.epsilon(tail, is);
                    tail = ie;
                }
                (s, tail)
            }
            Particle::Choice(items) => {
                let s = self.new_state();
                let e = self.new_state();
                for item in items {
                    let (is, ie) = self.build(item);
                    self.epsilon(s, is);
                    self.epsilon(ie, e);
                }
                (s, e)
            }
            Particle::Optional(inner) => {
                let (is, ie) = self.build(inner);
                let s = self.new_state();
                let e = self.new_state();
                self.epsilon(s, is);
                self.epsilon(s, e);
                self.epsilon(ie, e);
                (s, e)
            }
            Particle::ZeroOrMore(inner) => {
                let (is, ie) = self.build(inner);
                let s = self.new_state();
                let e = self.new_state();
                self.epsilon(s, is);
                self.epsilon(s, e);
                self.epsilon(ie, is);
                self.epsilon(ie, e);
                (s, e)
            }
            Particle::OneOrMore(inner) => {
                let (is, ie) = self.build(inner);
                let s = self.new_state();
                let e = self.new_state();
                self.epsilon(s, is);
                self.epsilon(ie, is);
                self.epsilon(ie, e);
                (s, e)
            }
        }
    }

    fn closure(&self, seed: impl IntoIterator<Item = usize>) -> BTreeSet<usize> {
        let mut set = BTreeSet::new();
        let mut stack: Vec<usize> = seed.into_iter().collect();
        while let Some(s) = stack.pop() {
            if !set.insert(s) {
                continue;
            }
            for edge in &self.states[s] {
                if let Edge::Epsilon(t) = edge {
                    stack.push(*t);
                }
            }
        }
        set
    }

    fn start_set(&self) -> BTreeSet<usize> {
        self.closure([self.start])
    }

    fn step(&self, states: &BTreeSet<usize>, name: &str) -> BTreeSet<usize> {
        let targets = states.iter().flat_map(|&s| {
            self.states[s].iter().filter_map(move |edge| match edge {
                Edge::Name(n, t) if n == name => Some(*t),
                _ => None,
            })
        });
        self.closure(targets.collect::<Vec<_>>())
    }

    fn is_accepting(&self, states: &BTreeSet<usize>) -> bool {
        states.contains(&self.accept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str) -> Particle {
        Particle::Name(n.to_string())
    }

    fn run(model: &ContentModel, children: &[&str]) -> bool {
        let mut cursor = model.cursor();
        for child in children {
            if !model.accept_child(&mut cursor, child) {
                return false;
            }
        }
        model.accepts_end(&cursor)
    }

    #[test]
    fn test_sequence_with_repetition() {
        // (title, author+, year?)
        let p = Particle::Seq(vec![
            name("title"),
            Particle::OneOrMore(Box::new(name("author"))),
            Particle::Optional(Box::new(name("year"))),
        ]);
        let model = ContentModel::Children(Automaton::compile(&p));
        assert!(run(&model, &["title", "author"]));
        assert!(run(&model, &["title", "author", "author", "year"]));
        assert!(!run(&model, &["title"]));
        assert!(!run(&model, &["author", "title"]));
        assert!(!run(&model, &["title", "author", "year", "year"]));
    }

    #[test]
    fn test_star_choice() {
        // (author | title | pages)*
        let p = Particle::ZeroOrMore(Box::new(Particle::Choice(vec![
            name("author"),
            name("title"),
            name("pages"),
        ])));
        let model = ContentModel::Children(Automaton::compile(&p));
        assert!(run(&model, &[]));
        assert!(run(&model, &["pages", "author", "title", "author"]));
        assert!(!run(&model, &["author", "journal"]));
    }

    #[test]
    fn test_rejection_leaves_cursor_untouched() {
        let p = Particle::Seq(vec![name("a"), name("b")]);
        let model = ContentModel::Children(Automaton::compile(&p));
        let mut cursor = model.cursor();
        assert!(model.accept_child(&mut cursor, "a"));
        let before = cursor.clone();
        assert!(!model.accept_child(&mut cursor, "c"));
        assert_eq!(cursor, before);
    }

    #[test]
    fn test_mixed_empty_any() {
        let mixed = ContentModel::Mixed(vec!["i".into(), "sub".into()]);
        assert!(run(&mixed, &["i", "sub", "i"]));
        assert!(!run(&mixed, &["b"]));
        assert_eq!(mixed.text_rule(), TextRule::Allowed);

        assert!(run(&ContentModel::Empty, &[]));
        assert!(!run(&ContentModel::Empty, &["x"]));
        assert_eq!(ContentModel::Empty.text_rule(), TextRule::Forbidden);

        assert!(run(&ContentModel::Any, &["anything", "goes"]));
    }
}
