//! Fuzzy full-text matching over entity names and titles.
//!
//! Free text is turned into a Lucene-style query: every word becomes a fuzzy
//! clause (`word~0.8`) and, for multi-word input, the whole phrase is OR'd in
//! with a proximity tolerance (`"w1 w2"~7`). [`EntityIndex`] scores documents
//! against that query and always ranks them in the same order, so a given
//! input resolves to the same node every time.

use std::{cmp::Ordering, fmt};

use crate::models::{NodeKey, NodeLabel};

pub const FUZZY_SIMILARITY: f32 = 0.8;
pub const PHRASE_SLOP: usize = 7;

const MAX_EDITS: usize = 2;
// phrase positions are searched exhaustively; titles are short but query text may not be
const MAX_PHRASE_TERMS: usize = 8;

const LUCENE_SPECIAL: &[char] =
    &['+', '-', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '\\', '/'];

/// Blanks out characters that carry meaning in Lucene query syntax. They
/// become word breaks, matching how [`tokenize`] splits indexed text.
pub fn blank_special(input: &str) -> String {
    input.chars().map(|c| if LUCENE_SPECIAL.contains(&c) { ' ' } else { c }).collect()
}

pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Converts a similarity into an edit budget for a term of `len` characters.
///
/// The single-precision similarity is widened before the subtraction, so
/// `0.8` yields slightly less than `0.2 * len` and a five-letter term gets no
/// edits at all.
pub fn max_edits(similarity: f32, len: usize) -> usize {
    let edits = ((1.0 - f64::from(similarity)) * len as f64) as usize;
    edits.min(MAX_EDITS)
}

#[derive(Clone, Debug, PartialEq)]
pub struct FuzzyTerm {
    pub term: String,
    pub max_edits: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FullTextQuery {
    pub terms: Vec<FuzzyTerm>,
    pub phrase: Option<Vec<String>>,
    pub slop: usize,
}

impl FullTextQuery {
    /// Returns `None` when nothing searchable is left after blanking.
    pub fn parse(input: &str) -> Option<Self> {
        let words = tokenize(&blank_special(input));
        if words.is_empty() {
            return None;
        }

        let terms = words
            .iter()
            .map(|w| FuzzyTerm {
                term: w.clone(),
                max_edits: max_edits(FUZZY_SIMILARITY, w.chars().count()),
            })
            .collect();

        let phrase = (words.len() > 1).then(|| words.into_iter().take(MAX_PHRASE_TERMS).collect());

        Some(Self { terms, phrase, slop: PHRASE_SLOP })
    }

    fn clause_count(&self) -> usize {
        self.terms.len() + usize::from(self.phrase.is_some())
    }
}

impl fmt::Display for FullTextQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut clauses: Vec<String> =
            self.terms.iter().map(|t| format!("{}~{}", t.term, FUZZY_SIMILARITY)).collect();
        if let Some(phrase) = &self.phrase {
            clauses.push(format!("\"{}\"~{}", phrase.join(" "), self.slop));
        }
        f.write_str(&clauses.join(" OR "))
    }
}

/// Optimal string alignment distance (adjacent transpositions count as one edit).
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let width = b.len() + 1;
    let mut d = vec![0usize; (a.len() + 1) * width];
    for i in 0..=a.len() {
        d[i * width] = i;
    }
    for j in 0..=b.len() {
        d[j] = j;
    }

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let mut best = (d[(i - 1) * width + j] + 1)
                .min(d[i * width + j - 1] + 1)
                .min(d[(i - 1) * width + j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                best = best.min(d[(i - 2) * width + j - 2] + 1);
            }
            d[i * width + j] = best;
        }
    }

    d[a.len() * width + b.len()]
}

/// Minimal positional distance of `phrase` inside `tokens`, if within `slop`.
fn phrase_distance(phrase: &[String], tokens: &[String], slop: usize) -> Option<usize> {
    let positions: Vec<Vec<usize>> = phrase
        .iter()
        .map(|term| tokens.iter().enumerate().filter(|(_, t)| *t == term).map(|(i, _)| i).collect())
        .collect();
    if positions.iter().any(Vec::is_empty) {
        return None;
    }

    let mut best = None;
    let mut chosen = Vec::with_capacity(phrase.len());
    search_positions(&positions, &mut chosen, &mut best);
    best.filter(|d| *d <= slop)
}

fn search_positions(positions: &[Vec<usize>], chosen: &mut Vec<usize>, best: &mut Option<usize>) {
    let i = chosen.len();
    if i == positions.len() {
        let anchor = chosen[0] as isize;
        let distance = chosen
            .iter()
            .enumerate()
            .map(|(k, p)| ((*p as isize - anchor) - k as isize).unsigned_abs())
            .sum::<usize>();
        if best.is_none_or(|b| distance < b) {
            *best = Some(distance);
        }
        return;
    }
    for &p in &positions[i] {
        if chosen.contains(&p) {
            continue;
        }
        chosen.push(p);
        search_positions(positions, chosen, best);
        chosen.pop();
    }
}

#[derive(Clone, Debug)]
struct Document {
    key: NodeKey,
    text: String,
    tokens: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Hit {
    pub key: NodeKey,
    pub text: String,
    pub score: f64,
}

impl Hit {
    pub fn label(&self) -> NodeLabel {
        self.key.label()
    }
}

/// In-memory index over `Person.name` and `Movie.title`.
#[derive(Debug, Default)]
pub struct EntityIndex {
    docs: Vec<Document>,
}

impl EntityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: NodeKey, text: impl Into<String>) {
        let text = text.into();
        let tokens = tokenize(&text);
        if tokens.is_empty() {
            return;
        }
        self.docs.push(Document { key, text, tokens });
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn search(&self, query: &FullTextQuery, label: Option<NodeLabel>, limit: usize) -> Vec<Hit> {
        let mut hits: Vec<Hit> = self
            .docs
            .iter()
            .filter(|doc| label.is_none_or(|l| doc.key.label() == l))
            .filter_map(|doc| {
                score(query, &doc.tokens).map(|score| Hit {
                    key: doc.key.clone(),
                    text: doc.text.clone(),
                    score,
                })
            })
            .collect();

        hits.sort_by(rank);
        hits.truncate(limit);
        hits
    }

    pub fn top(&self, query: &FullTextQuery, label: Option<NodeLabel>) -> Option<Hit> {
        self.search(query, label, 1).into_iter().next()
    }
}

fn rank(a: &Hit, b: &Hit) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.text.chars().count().cmp(&b.text.chars().count()))
        .then_with(|| a.key.cmp(&b.key))
}

fn score(query: &FullTextQuery, tokens: &[String]) -> Option<f64> {
    let mut matched = 0usize;
    let mut sum = 0.0f64;

    for fuzzy in &query.terms {
        let best = tokens
            .iter()
            .filter_map(|token| {
                let d = edit_distance(&fuzzy.term, token);
                (d <= fuzzy.max_edits).then(|| {
                    let shorter = fuzzy.term.chars().count().min(token.chars().count()).max(1);
                    1.0 - d as f64 / shorter as f64
                })
            })
            .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.max(s))));
        if let Some(s) = best {
            matched += 1;
            sum += s;
        }
    }

    if let Some(phrase) = &query.phrase {
        if let Some(distance) = phrase_distance(phrase, tokens, query.slop) {
            matched += 1;
            sum += phrase.len() as f64 / (1.0 + distance as f64);
        }
    }

    if matched == 0 {
        return None;
    }

    let coord = matched as f64 / query.clause_count() as f64;
    let norm = 1.0 / (tokens.len() as f64).sqrt();
    Some(sum * coord * norm)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> EntityIndex {
        let mut idx = EntityIndex::new();
        idx.insert(NodeKey::Movie(1), "Casino");
        idx.insert(NodeKey::Movie(2), "Casino Royale");
        idx.insert(NodeKey::Movie(3), "Toy Story");
        idx.insert(NodeKey::Person("Tom Hanks".into()), "Tom Hanks");
        idx.insert(NodeKey::Person("Tom Hardy".into()), "Tom Hardy");
        idx.insert(NodeKey::Person("Joe Pesci".into()), "Joe Pesci");
        idx
    }

    #[test]
    fn edit_budget_follows_lucene_conversion() {
        assert_eq!(max_edits(0.8, 3), 0);
        assert_eq!(max_edits(0.8, 5), 0);
        assert_eq!(max_edits(0.8, 6), 1);
        assert_eq!(max_edits(0.8, 10), 1);
        assert_eq!(max_edits(0.8, 11), 2);
        assert_eq!(max_edits(0.8, 40), 2);
    }

    #[test]
    fn query_renders_as_lucene_syntax() {
        let q = FullTextQuery::parse("Tom (Hanks)!").unwrap();
        assert_eq!(q.to_string(), "tom~0.8 OR hanks~0.8 OR \"tom hanks\"~7");

        let single = FullTextQuery::parse("casino").unwrap();
        assert_eq!(single.to_string(), "casino~0.8");
        assert!(single.phrase.is_none());
    }

    #[test]
    fn punctuated_titles_match_their_own_text() {
        let mut idx = EntityIndex::new();
        idx.insert(NodeKey::Movie(5816), "Spider-Man");
        idx.insert(NodeKey::Movie(3793), "X-Men");
        idx.insert(NodeKey::Movie(1573), "Face/Off");
        idx.insert(NodeKey::Movie(1), "Toy Story");

        let q = FullTextQuery::parse("Spider-Man").unwrap();
        assert_eq!(q.to_string(), "spider~0.8 OR man~0.8 OR \"spider man\"~7");

        for (text, id) in [("Spider-Man", 5816), ("X-Men", 3793), ("Face/Off", 1573), ("spider man", 5816)] {
            let hit = idx.top(&FullTextQuery::parse(text).unwrap(), None);
            assert_eq!(hit.map(|h| h.key), Some(NodeKey::Movie(id)), "{text}");
        }
    }

    #[test]
    fn empty_input_yields_no_query() {
        assert!(FullTextQuery::parse("").is_none());
        assert!(FullTextQuery::parse("  ~*?  ").is_none());
    }

    #[test]
    fn edit_distance_counts_transpositions_once() {
        assert_eq!(edit_distance("casino", "casino"), 0);
        assert_eq!(edit_distance("casnio", "casino"), 1);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
    }

    #[test]
    fn phrase_distance_measures_reordering() {
        let tokens = tokenize("tom hanks");
        let phrase = vec!["hanks".to_string(), "tom".to_string()];
        assert_eq!(phrase_distance(&phrase, &tokens, 7), Some(2));
        assert_eq!(phrase_distance(&phrase, &tokens, 1), None);
    }

    #[test]
    fn shorter_exact_title_wins() {
        let idx = index();
        let q = FullTextQuery::parse("casino").unwrap();
        let hit = idx.top(&q, None).unwrap();
        assert_eq!(hit.key, NodeKey::Movie(1));
    }

    #[test]
    fn tolerates_a_typo_in_longer_words() {
        let idx = index();
        let q = FullTextQuery::parse("casnio").unwrap();
        assert_eq!(idx.top(&q, None).unwrap().key, NodeKey::Movie(1));
    }

    #[test]
    fn full_name_beats_partial_overlap() {
        let idx = index();
        let q = FullTextQuery::parse("tom hanks").unwrap();
        let hits = idx.search(&q, None, 10);
        assert_eq!(hits[0].key, NodeKey::Person("Tom Hanks".into()));
        assert!(hits.iter().any(|h| h.key == NodeKey::Person("Tom Hardy".into())));
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn label_filter_restricts_candidates() {
        let idx = index();
        let q = FullTextQuery::parse("tom").unwrap();
        assert!(idx.top(&q, Some(NodeLabel::Movie)).is_none());
        assert_eq!(idx.top(&q, Some(NodeLabel::Person)).unwrap().label(), NodeLabel::Person);
    }

    #[test]
    fn repeated_lookup_is_stable() {
        let idx = index();
        let q = FullTextQuery::parse("tom").unwrap();
        let first = idx.top(&q, None).unwrap();
        for _ in 0..5 {
            assert_eq!(idx.top(&q, None).unwrap().key, first.key);
        }
        // equal scores and lengths fall back to key order
        assert_eq!(first.key, NodeKey::Person("Tom Hanks".into()));
    }

    #[test]
    fn unmatched_query_returns_nothing() {
        let idx = index();
        let q = FullTextQuery::parse("zzzzzz").unwrap();
        assert!(idx.top(&q, None).is_none());
    }
}
