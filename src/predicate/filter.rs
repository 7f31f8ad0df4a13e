use {
    crate::{
        error::{Error, Result},
        predicate::{FieldRef, Predicate, Relation},
        view::feed::{SourceFeed, Value},
    },
    regex::Regex,
    serde::{Deserialize, Serialize},
    std::cmp::Ordering,
};

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Requirement {
    /// Every criterion has to pass.
    #[default]
    All,
    /// One passing criterion is enough.
    Any,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparator {
    Equal,
    LessThan,
    LessOrEqual,
    /// Regular expression search in the text form of the value.
    Matches,
    /// Some element of a list value equals the operand.
    ElementEqual,
    /// Some element of a list value matches the regular expression.
    ElementMatches,
}

impl Comparator {
    /// Parses the textual comparator of a filter configuration into the
    /// comparator and whether its result is negated.
    pub fn parse(text: &str) -> Result<(Comparator, bool)> {
        Ok(match text {
            "==" => (Comparator::Equal, false),
            "!=" => (Comparator::Equal, true),
            "<" => (Comparator::LessThan, false),
            ">=" => (Comparator::LessThan, true),
            "<=" => (Comparator::LessOrEqual, false),
            ">" => (Comparator::LessOrEqual, true),
            "match" => (Comparator::Matches, false),
            "!match" => (Comparator::Matches, true),
            "contains" => (Comparator::ElementEqual, false),
            "!contains" => (Comparator::ElementEqual, true),
            "elementMatch" => (Comparator::ElementMatches, false),
            "!elementMatch" => (Comparator::ElementMatches, true),
            other => return Err(Error::InvalidFilter(format!("unknown comparator {:?}", other))),
        })
    }

    fn uses_regex(self) -> bool {
        matches!(self, Comparator::Matches | Comparator::ElementMatches)
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

#[derive(Clone, Debug)]
pub struct Criterion {
    field: FieldRef,
    comparator: Comparator,
    value: Value,
    negate: bool,
    regex: Option<Regex>,
}

impl PartialEq for Criterion {
    fn eq(&self, other: &Self) -> bool {
        self.field.name() == other.field.name()
            && self.comparator == other.comparator
            && self.value == other.value
            && self.negate == other.negate
    }
}

impl Criterion {
    pub fn new(field: &str, comparator: Comparator, value: impl Into<Value>, negate: bool) -> Result<Self> {
        let value = value.into();
        let regex = if comparator.uses_regex() {
            Some(Regex::new(&value.to_string())?)
        } else {
            None
        };

        Ok(Criterion {
            field: FieldRef::new(field),
            comparator,
            value,
            negate,
            regex,
        })
    }

    pub fn parse(field: &str, comparator: &str, value: impl Into<Value>) -> Result<Self> {
        let (comparator, negate) = Comparator::parse(comparator)?;
        Criterion::new(field, comparator, value, negate)
    }

    pub fn field(&self) -> &str {
        self.field.name()
    }

    fn regex_matches(&self, value: &Value) -> bool {
        self.regex
            .as_ref()
            .map_or(false, |re| re.is_match(&value.to_string()))
    }

    fn test(&self, value: &Value) -> bool {
        match self.comparator {
            Comparator::Equal => value.loosely_equals(&self.value),
            Comparator::LessThan => value.compare(&self.value) == Some(Ordering::Less),
            Comparator::LessOrEqual => {
                matches!(value.compare(&self.value), Some(Ordering::Less | Ordering::Equal))
            }
            Comparator::Matches => self.regex_matches(value),
            Comparator::ElementEqual => value.elements().iter().any(|e| e.loosely_equals(&self.value)),
            Comparator::ElementMatches => value.elements().iter().any(|e| self.regex_matches(e)),
        }
    }

    pub fn passes(&mut self, feed: &dyn SourceFeed, row: usize) -> bool {
        let value = self
            .field
            .resolve(feed)
            .and_then(|id| feed.read(row, id))
            .unwrap_or_default();

        self.test(&value) != self.negate
    }
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
               Configuration
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// One filter entry as written in a configuration file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(alias = "role", alias = "property")]
    pub field: String,
    pub comparator: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
    #[serde(default)]
    pub requirement: Requirement,
}

impl FilterConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn criteria(&self) -> Result<Vec<Criterion>> {
        self.filters
            .iter()
            .map(|f| Criterion::parse(&f.field, &f.comparator, f.value.clone()))
            .collect()
    }
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
             Filter Predicate
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
#[derive(Clone, Debug, Default)]
pub struct FilterPredicate {
    criteria: Vec<Criterion>,
    requirement: Requirement,
}

impl FilterPredicate {
    pub fn new(criteria: Vec<Criterion>, requirement: Requirement) -> Self {
        FilterPredicate { criteria, requirement }
    }

    pub fn from_config(config: &FilterConfig) -> Result<Self> {
        Ok(FilterPredicate::new(config.criteria()?, config.requirement))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        FilterPredicate::from_config(&FilterConfig::from_json(json)?)
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn requirement(&self) -> Requirement {
        self.requirement
    }

    /// Returns `None` if nothing changed.
    pub fn set_criteria(&mut self, criteria: Vec<Criterion>) -> Option<Relation> {
        if criteria == self.criteria {
            return None;
        }
        self.criteria = criteria;
        Some(Relation::Unrelated)
    }

    pub fn set_requirement(&mut self, requirement: Requirement) -> Option<Relation> {
        if requirement == self.requirement {
            return None;
        }
        self.requirement = requirement;
        Some(Relation::Unrelated)
    }
}

impl Predicate for FilterPredicate {
    fn is_filtering(&self) -> bool {
        !self.criteria.is_empty()
    }

    fn accepts(&mut self, feed: &dyn SourceFeed, row: usize) -> bool {
        match self.requirement {
            Requirement::All => self.criteria.iter_mut().all(|c| c.passes(feed, row)),
            Requirement::Any => self.criteria.iter_mut().any(|c| c.passes(feed, row)),
        }
    }

    fn bind(&mut self, _feed: Option<&dyn SourceFeed>) {
        for c in self.criteria.iter_mut() {
            c.field.unresolve();
        }
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{buffer::rows::RowBuffer, view::feed::{FieldId, Record}},
        assert_matches::assert_matches,
    };

    #[derive(Clone)]
    struct Person {
        name: &'static str,
        age: i64,
        tags: Vec<&'static str>,
    }

    impl Record for Person {
        fn field_names() -> &'static [&'static str] {
            &["name", "age", "tags"]
        }

        fn field(&self, id: FieldId) -> Value {
            match id.0 {
                0 => self.name.into(),
                1 => self.age.into(),
                2 => self.tags.clone().into(),
                _ => Value::Null,
            }
        }
    }

    fn people() -> RowBuffer<Person> {
        RowBuffer::with_data(vec![
            Person { name: "Ada", age: 36, tags: vec!["math", "engines"] },
            Person { name: "Alan", age: 41, tags: vec!["math", "crypto"] },
            Person { name: "Grace", age: 85, tags: vec!["cobol"] },
        ])
    }

    fn accepted(pred: &mut FilterPredicate, buf: &RowBuffer<Person>) -> Vec<usize> {
        let feed = buf.get_port().get_view().unwrap();
        (0..feed.row_count()).filter(|&r| pred.accepts(&*feed, r)).collect()
    }

    #[test]
    fn comparator_table() {
        assert_eq!(Comparator::parse(">").unwrap(), (Comparator::LessOrEqual, true));
        assert_eq!(Comparator::parse(">=").unwrap(), (Comparator::LessThan, true));
        assert_eq!(Comparator::parse("!elementMatch").unwrap(), (Comparator::ElementMatches, true));
        assert_matches!(Comparator::parse("~="), Err(Error::InvalidFilter(_)));
    }

    #[test]
    fn numeric_comparisons() {
        let buf = people();
        let mut pred = FilterPredicate::new(vec![Criterion::parse("age", ">", 40i64).unwrap()], Requirement::All);
        assert_eq!(accepted(&mut pred, &buf), vec![1, 2]);

        let mut pred = FilterPredicate::new(vec![Criterion::parse("age", "<=", 41i64).unwrap()], Requirement::All);
        assert_eq!(accepted(&mut pred, &buf), vec![0, 1]);
    }

    #[test]
    fn regex_and_elements() {
        let buf = people();
        let mut pred = FilterPredicate::new(vec![Criterion::parse("name", "match", "^A").unwrap()], Requirement::All);
        assert_eq!(accepted(&mut pred, &buf), vec![0, 1]);

        let mut pred = FilterPredicate::new(vec![Criterion::parse("tags", "contains", "math").unwrap()], Requirement::All);
        assert_eq!(accepted(&mut pred, &buf), vec![0, 1]);

        let mut pred = FilterPredicate::new(vec![Criterion::parse("tags", "!elementMatch", "^c").unwrap()], Requirement::All);
        assert_eq!(accepted(&mut pred, &buf), vec![0]);
    }

    #[test]
    fn all_versus_any() {
        let buf = people();
        let criteria = vec![
            Criterion::parse("name", "==", "Grace").unwrap(),
            Criterion::parse("age", "<", 40i64).unwrap(),
        ];

        let mut all = FilterPredicate::new(criteria.clone(), Requirement::All);
        assert!(accepted(&mut all, &buf).is_empty());

        let mut any = FilterPredicate::new(criteria, Requirement::Any);
        assert_eq!(accepted(&mut any, &buf), vec![0, 2]);
    }

    #[test]
    fn unknown_field_compares_as_null() {
        let buf = people();
        let mut pred = FilterPredicate::new(vec![Criterion::parse("email", "!=", "x").unwrap()], Requirement::All);
        assert_eq!(accepted(&mut pred, &buf), vec![0, 1, 2]);
    }

    #[test]
    fn config_from_json() {
        let mut pred = FilterPredicate::from_json(
            r#"{
                "requirement": "any",
                "filters": [
                    { "role": "age", "comparator": ">=", "value": 80 },
                    { "property": "name", "comparator": "==", "value": "Ada" }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(pred.requirement(), Requirement::Any);
        assert_eq!(pred.criteria().len(), 2);
        assert_eq!(accepted(&mut pred, &people()), vec![0, 2]);

        assert_matches!(FilterPredicate::from_json("{ \"filters\": 3 }"), Err(Error::InvalidConfig(_)));
        assert_matches!(
            FilterPredicate::from_json(r#"{ "filters": [ { "field": "name", "comparator": "match", "value": "(" } ] }"#),
            Err(Error::InvalidFilter(_))
        );
    }

    #[test]
    fn unchanged_criteria_are_no_op() {
        let c = vec![Criterion::parse("age", "<", 50i64).unwrap()];
        let mut pred = FilterPredicate::new(c.clone(), Requirement::All);
        assert_eq!(pred.set_criteria(c), None);
        assert_eq!(pred.set_requirement(Requirement::All), None);
        assert_eq!(pred.set_requirement(Requirement::Any), Some(Relation::Unrelated));
        assert!(!FilterPredicate::default().is_filtering());
    }
}
