//! Word splitting and diacritic-aware token matching for text search.
//!
//! Text is split into words in NFC, each word expands into its alternative
//! spellings (`straße` → `straße`, `strasse`), and the alternatives are
//! compared in NFD so every diacritic is a combining mark following its base
//! letter. A pattern letter without marks matches the same base letter with
//! any marks, a pattern letter that carries marks needs exactly those marks.

use {
    serde::{Deserialize, Serialize},
    std::{collections::HashSet, sync::Arc},
    unicode_normalization::{char::is_combining_mark, UnicodeNormalization},
};

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// A pattern word matches the start of a token.
    #[default]
    Beginning,
    /// A pattern word matches anywhere inside a token.
    Anywhere,
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// Letters without a canonical decomposition that still have a plain spelling.
const EXPANSIONS: &[(char, &str)] = &[
    ('ß', "ss"),
    ('ẞ', "SS"),
    ('æ', "ae"),
    ('Æ', "AE"),
    ('ð', "d"),
    ('Ð', "D"),
    ('ø', "o"),
    ('Ø', "O"),
    ('þ', "th"),
    ('Þ', "TH"),
    ('đ', "d"),
    ('Đ', "D"),
    ('ħ', "h"),
    ('Ħ', "H"),
    ('ĸ', "k"),
    ('ł', "l"),
    ('Ł', "L"),
    ('ŋ', "n"),
    ('Ŋ', "N"),
    ('œ', "oe"),
    ('Œ', "OE"),
    ('ŧ', "t"),
    ('Ŧ', "T"),
    ('ſ', "s"),
];

pub fn expansion(c: char) -> Option<&'static str> {
    EXPANSIONS.iter().find(|(l, _)| *l == c).map(|(_, e)| *e)
}

fn is_apostrophe(c: char) -> bool {
    matches!(c, '\'' | '’')
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// Splits `text` into words.
///
/// A word is a run of alphanumeric characters and combining marks, in NFC. An
/// apostrophe directly after a word belongs to it (`o'neill`, `dogs'`), any
/// other punctuation separates words and is dropped.
pub fn split_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut cur = String::new();

    for c in text.nfc() {
        if c.is_alphanumeric() || (is_combining_mark(c) && !cur.is_empty()) {
            cur.push(c);
        } else if is_apostrophe(c) && !cur.is_empty() {
            cur.push('\'');
        } else if !cur.is_empty() {
            words.push(std::mem::take(&mut cur));
        }
    }
    if !cur.is_empty() {
        words.push(cur);
    }
    words
}

/// Every spelling of `word` obtained by expanding special letters.
pub fn alternatives(word: &str) -> Vec<String> {
    let mut alts = vec![String::new()];
    for c in word.chars() {
        match expansion(c) {
            Some(exp) => {
                let mut expanded: Vec<String> = alts.iter().map(|a| format!("{}{}", a, exp)).collect();
                for a in alts.iter_mut() {
                    a.push(c);
                }
                alts.append(&mut expanded);
            }
            None => {
                for a in alts.iter_mut() {
                    a.push(c);
                }
            }
        }
    }
    alts
}

/// `text` decomposed, as compared by [`token_matches`].
pub fn decompose(text: &str) -> String {
    text.nfd().collect()
}

/// Whether `pattern` matches `token` starting at character `at`, both
/// decomposed.
fn matches_at(token: &[char], at: usize, pattern: &[char]) -> bool {
    let (mut t, mut p) = (at, 0);
    while p < pattern.len() {
        if t >= token.len() || token[t] != pattern[p] {
            return false;
        }
        t += 1;
        p += 1;

        let pattern_marks = p;
        while p < pattern.len() && is_combining_mark(pattern[p]) {
            p += 1;
        }
        let token_marks = t;
        while t < token.len() && is_combining_mark(token[t]) {
            t += 1;
        }

        // marks on the token side only count if the pattern spells some
        if p > pattern_marks && pattern[pattern_marks..p] != token[token_marks..t] {
            return false;
        }
    }
    true
}

pub fn token_matches(token: &str, pattern: &[char], mode: MatchMode) -> bool {
    let token: Vec<char> = token.chars().collect();
    match mode {
        MatchMode::Beginning => matches_at(&token, 0, pattern),
        MatchMode::Anywhere => {
            (0..token.len()).any(|at| !is_combining_mark(token[at]) && matches_at(&token, at, pattern))
        }
    }
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
              Token Interner
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// Shares one allocation per distinct token text.
///
/// Eviction: once `capacity` distinct tokens are held the table is cleared
/// before the next insertion. Tokens handed out earlier stay valid, they are
/// merely no longer shared with later ones.
pub struct TokenInterner {
    table: HashSet<Arc<str>>,
    capacity: usize,
}

impl TokenInterner {
    pub const DEFAULT_CAPACITY: usize = 16 * 1024;

    pub fn new() -> Self {
        TokenInterner::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        TokenInterner {
            table: HashSet::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn intern(&mut self, text: &str) -> Arc<str> {
        if let Some(token) = self.table.get(text) {
            return token.clone();
        }
        if self.table.len() >= self.capacity {
            self.table.clear();
        }
        let token: Arc<str> = Arc::from(text);
        self.table.insert(token.clone());
        token
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }
}

impl Default for TokenInterner {
    fn default() -> Self {
        TokenInterner::new()
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// Decomposed tokens of one source row, sorted and deduplicated.
#[derive(Clone, Debug, Default)]
pub struct RowTokens {
    pub exact: Vec<Arc<str>>,
    pub lowercase: Vec<Arc<str>>,
}

impl RowTokens {
    pub fn from_texts<'a>(texts: impl IntoIterator<Item = &'a str>, interner: &mut TokenInterner) -> Self {
        let mut tokens = RowTokens::default();
        for text in texts {
            for word in split_words(text) {
                for alt in alternatives(&word) {
                    tokens.exact.push(interner.intern(&decompose(&alt)));
                }
                for alt in alternatives(&word.to_lowercase()) {
                    tokens.lowercase.push(interner.intern(&decompose(&alt)));
                }
            }
        }
        tokens.exact.sort();
        tokens.exact.dedup();
        tokens.lowercase.sort();
        tokens.lowercase.dedup();
        tokens
    }
}

/// Pattern split into words, each with its alternative spellings.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchPattern {
    words: Vec<Vec<Vec<char>>>,
}

impl SearchPattern {
    pub fn new(pattern: &str, case_sensitive: bool) -> Self {
        let pattern = if case_sensitive {
            pattern.to_string()
        } else {
            pattern.to_lowercase()
        };
        SearchPattern {
            words: split_words(&pattern)
                .iter()
                .map(|w| alternatives(w).iter().map(|a| a.nfd().collect()).collect())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Every pattern word has to match at least one token.
    pub fn matches(&self, tokens: &[Arc<str>], mode: MatchMode) -> bool {
        self.words.iter().all(|alts| {
            alts.iter()
                .any(|alt| tokens.iter().any(|t| token_matches(t, alt, mode)))
        })
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
