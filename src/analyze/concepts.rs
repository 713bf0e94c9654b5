// src/analyze/concepts.rs
//! Key-phrase extraction for the run summary.
//!
//! A phrase is a run of 2–4 consecutive content words (no stopwords, no bare
//! numbers) inside one clause. Longer runs are cut into 4-word pieces.
//! Phrases containing the topic itself are skipped.

use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::HashMap;

use crate::relevance::{is_stopword, words_lower};

pub const MAX_CONCEPTS: usize = 10;
const MIN_PHRASE_WORDS: usize = 2;
const MAX_PHRASE_WORDS: usize = 4;
/// Upper bound on text scanned per run.
const MAX_SCAN_CHARS: usize = 100_000;

fn is_content_word(w: &str) -> bool {
    w.chars().count() >= 2 && !is_stopword(w) && !w.chars().all(|c| c.is_ascii_digit())
}

fn clauses(text: &str) -> impl Iterator<Item = &str> {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r#"[.,;:!?()\[\]{}"\n\x{2014}\x{2013}]|\s-\s"#).unwrap())
        .split(text)
}

fn phrases_in(clause: &str, out: &mut Vec<String>) {
    let mut run: Vec<String> = Vec::new();
    let flush = |run: &mut Vec<String>, out: &mut Vec<String>| {
        for piece in run.chunks(MAX_PHRASE_WORDS) {
            if piece.len() >= MIN_PHRASE_WORDS {
                out.push(piece.join(" "));
            }
        }
        run.clear();
    };
    for w in words_lower(clause) {
        if is_content_word(&w) {
            run.push(w);
        } else {
            flush(&mut run, out);
        }
    }
    flush(&mut run, out);
}

/// Most frequent phrases across `texts`, ties broken by first appearance.
pub fn top_concepts<'a, I>(texts: I, topic: &str, max: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let topic = words_lower(topic).join(" ");

    let mut phrases = Vec::new();
    let mut budget = MAX_SCAN_CHARS;
    for text in texts {
        if budget == 0 {
            break;
        }
        let slice: String = text.chars().take(budget).collect();
        budget = budget.saturating_sub(slice.chars().count());
        for clause in clauses(&slice) {
            phrases_in(clause, &mut phrases);
        }
    }

    // phrase → (count, first index)
    let mut stats: HashMap<String, (usize, usize)> = HashMap::new();
    for (i, p) in phrases.into_iter().enumerate() {
        if !topic.is_empty() && p.contains(&topic) {
            continue;
        }
        stats.entry(p).or_insert((0, i)).0 += 1;
    }

    let mut ranked: Vec<(String, usize, usize)> =
        stats.into_iter().map(|(p, (n, first))| (p, n, first)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.into_iter().take(max).map(|(p, _, _)| p).collect()
}
