use {
    crate::{
        error::Result,
        predicate::{
            tokenize::{MatchMode, RowTokens, SearchPattern, TokenInterner},
            FieldRef, Predicate, Relation,
        },
        view::feed::{FieldId, SourceFeed},
    },
    serde::{Deserialize, Serialize},
};

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

fn default_case_sensitive() -> bool {
    true
}

/// Search settings as written in a configuration file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub pattern: String,
    #[serde(default = "default_case_sensitive")]
    pub case_sensitive: bool,
    #[serde(default)]
    pub match_mode: MatchMode,
}

impl SearchConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            fields: vec![],
            pattern: String::new(),
            case_sensitive: true,
            match_mode: MatchMode::default(),
        }
    }
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
             Search Predicate
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// Accepts rows whose search fields contain every word of the pattern.
///
/// Tokens of each source row are computed on first use and cached by source
/// row; the `rows_*` hooks keep the cache aligned with the feed.
pub struct SearchPredicate {
    fields: Vec<FieldRef>,
    pattern: String,
    case_sensitive: bool,
    match_mode: MatchMode,

    compiled: SearchPattern,
    tokens: Vec<Option<RowTokens>>,
    interner: TokenInterner,
}

impl SearchPredicate {
    pub fn new(fields: &[&str], pattern: &str) -> Self {
        SearchPredicate::from_config(&SearchConfig {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            pattern: pattern.into(),
            ..SearchConfig::default()
        })
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        SearchPredicate {
            fields: config.fields.iter().map(FieldRef::new).collect(),
            pattern: config.pattern.clone(),
            case_sensitive: config.case_sensitive,
            match_mode: config.match_mode,
            compiled: SearchPattern::new(&config.pattern, config.case_sensitive),
            tokens: Vec::new(),
            interner: TokenInterner::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(SearchPredicate::from_config(&SearchConfig::from_json(json)?))
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn match_mode(&self) -> MatchMode {
        self.match_mode
    }

    fn recompile(&mut self) {
        self.compiled = SearchPattern::new(&self.pattern, self.case_sensitive);
    }

    /// Returns `None` if the pattern did not change.
    pub fn set_pattern(&mut self, pattern: &str) -> Option<Relation> {
        if pattern == self.pattern {
            return None;
        }

        let relation = if !self.pattern.is_empty() && pattern.starts_with(self.pattern.as_str()) {
            Relation::Narrowing
        } else if self.pattern.starts_with(pattern) {
            Relation::Widening
        } else {
            Relation::Unrelated
        };

        self.pattern = pattern.to_string();
        self.recompile();
        Some(relation)
    }

    pub fn set_case_sensitive(&mut self, case_sensitive: bool) -> Option<Relation> {
        if case_sensitive == self.case_sensitive {
            return None;
        }
        self.case_sensitive = case_sensitive;
        self.recompile();

        Some(if self.pattern.is_empty() {
            Relation::Unrelated
        } else if case_sensitive {
            Relation::Narrowing
        } else {
            Relation::Widening
        })
    }

    pub fn set_match_mode(&mut self, mode: MatchMode) -> Option<Relation> {
        if mode == self.match_mode {
            return None;
        }
        self.match_mode = mode;
        Some(Relation::Unrelated)
    }

    pub fn set_fields(&mut self, fields: &[&str]) -> Option<Relation> {
        if fields.len() == self.fields.len() && fields.iter().zip(self.fields.iter()).all(|(a, b)| *a == b.name()) {
            return None;
        }
        self.fields = fields.iter().map(|f| FieldRef::new(*f)).collect();
        self.tokens.clear();
        Some(Relation::Unrelated)
    }

    fn cache_row(&mut self, feed: &dyn SourceFeed, row: usize) {
        let len = feed.row_count().max(row + 1);
        if self.tokens.len() < len {
            self.tokens.resize(len, None);
        }
        if self.tokens[row].is_some() {
            return;
        }

        let ids: Vec<FieldId> = self.fields.iter_mut().filter_map(|f| f.resolve(feed)).collect();
        let texts: Vec<String> = ids
            .into_iter()
            .filter_map(|id| feed.read(row, id))
            .flat_map(|v| v.texts())
            .collect();
        self.tokens[row] = Some(RowTokens::from_texts(
            texts.iter().map(String::as_str),
            &mut self.interner,
        ));
    }
}

impl Predicate for SearchPredicate {
    fn is_filtering(&self) -> bool {
        !self.compiled.is_empty()
    }

    fn accepts(&mut self, feed: &dyn SourceFeed, row: usize) -> bool {
        if self.compiled.is_empty() {
            return true;
        }

        self.cache_row(feed, row);
        let tokens = match self.tokens.get(row).and_then(Option::as_ref) {
            Some(tokens) => tokens,
            None => return false,
        };

        if self.case_sensitive {
            self.compiled.matches(&tokens.exact, self.match_mode)
        } else {
            self.compiled.matches(&tokens.lowercase, self.match_mode)
        }
    }

    fn bind(&mut self, _feed: Option<&dyn SourceFeed>) {
        for f in self.fields.iter_mut() {
            f.unresolve();
        }
        self.tokens.clear();
        self.interner.clear();
    }

    fn rows_inserted(&mut self, first: usize, count: usize) {
        if first <= self.tokens.len() {
            self.tokens.splice(first..first, std::iter::repeat(None).take(count));
        }
    }

    fn rows_removed(&mut self, first: usize, count: usize) {
        let len = self.tokens.len();
        if first < len {
            self.tokens.drain(first..(first + count).min(len));
        }
    }

    fn rows_moved(&mut self, first: usize, count: usize, dest: usize) {
        if first + count > self.tokens.len() || dest > self.tokens.len() {
            self.tokens.clear();
            return;
        }
        let block: Vec<_> = self.tokens.drain(first..first + count).collect();
        let at = if dest > first { dest - count } else { dest };
        self.tokens.splice(at..at, block);
    }

    fn rows_changed(&mut self, first: usize, count: usize) {
        let len = self.tokens.len();
        for slot in self.tokens[first.min(len)..(first + count).min(len)].iter_mut() {
            *slot = None;
        }
    }

    fn rows_cleared(&mut self) {
        self.tokens.clear();
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
