use crate::label::Label;
use ahash::AHashMap;
use itertools::Itertools;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::ops::Range;
use std::str::FromStr;
use thiserror::Error;

use super::Entity;

/// What happens when two entities of the same label are vectorized for one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlapStrategy {
    /// Each entity rewrites the whole vector of its label. Only the last entity (in start offset
    /// order) of a label survives. This is what the annotation pipeline has always produced.
    #[default]
    LastWriteWins,
    /// Each entity only sets its own positions; marks of earlier entities are kept.
    Union,
}

impl Display for OverlapStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LastWriteWins => write!(f, "last-write-wins"),
            Self::Union => write!(f, "union"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("could not parse `{0}` into an overlap strategy (expected `last-write-wins` or `union`)")]
pub struct ParsingOverlapStrategyError(pub String);

impl FromStr for OverlapStrategy {
    type Err = ParsingOverlapStrategyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_ref() {
            "last-write-wins" | "lastwritewins" | "last" => Ok(Self::LastWriteWins),
            "union" => Ok(Self::Union),
            _ => Err(ParsingOverlapStrategyError(String::from(s))),
        }
    }
}

/// Whether position `i` belongs to the entity spanning `[start, end)`.
///
/// The annotation tool's offsets are shifted relative to the character positions of the
/// scenario: a position is marked when `start - 2 < i < end - 1`. The comparison is done in
/// `i128`, which holds every `usize` offset without wrapping and keeps offsets below 2 from
/// underflowing.
#[inline(always)]
pub(crate) fn is_marked(start: usize, end: usize, i: usize) -> bool {
    let (start, end, i) = (start as i128, end as i128, i as i128);
    start - 2 < i && i < end - 1
}

/// One binary vector per label, all of the same length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelVectors {
    vectors: AHashMap<Label, Vec<u8>>,
    len: usize,
}

impl LabelVectors {
    fn zeros(len: usize) -> Self {
        let vectors = Label::iter().map(|label| (label, vec![0; len])).collect();
        Self { vectors, len }
    }

    /// Vector of `label`. Every label has one, so this never comes back empty unless the
    /// scenario itself is.
    pub fn get(&self, label: Label) -> &[u8] {
        self.vectors
            .get(&label)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Length shared by all the vectors.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Label, &[u8])> {
        Label::iter().map(move |label| (label, self.get(label)))
    }
}

/// Serialized as a map keyed by label name, in label declaration order.
impl Serialize for LabelVectors {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.vectors.len()))?;
        for (label, vector) in self.iter() {
            map.serialize_entry(&label, vector)?;
        }
        map.end()
    }
}

/// Turns a worker's entities into per-label binary vectors over the characters of a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanVectorizer {
    len: usize,
    overlap: OverlapStrategy,
}

impl SpanVectorizer {
    /// * `len`: Number of characters in the scenario.
    /// * `overlap`: How entities of the same label combine.
    pub fn new(len: usize, overlap: OverlapStrategy) -> Self {
        Self { len, overlap }
    }

    /// Entities are applied in ascending start offset. The sort is stable, so entities starting at
    /// the same offset keep their input order.
    pub fn vectorize(&self, entities: &[Entity]) -> LabelVectors {
        let mut label_vectors = LabelVectors::zeros(self.len);
        for entity in entities.iter().sorted_by_key(|e| e.start()) {
            let Some(vector) = label_vectors.vectors.get_mut(&entity.label()) else {
                continue;
            };
            let (start, end) = (entity.start(), entity.end());
            match self.overlap {
                OverlapStrategy::LastWriteWins => {
                    for (i, slot) in vector.iter_mut().enumerate() {
                        *slot = u8::from(is_marked(start, end, i));
                    }
                }
                OverlapStrategy::Union => {
                    for (i, slot) in vector.iter_mut().enumerate() {
                        if is_marked(start, end, i) {
                            *slot = 1;
                        }
                    }
                }
            }
        }
        label_vectors
    }
}

/// Contiguous runs of 1s in `vector`, as half-open index ranges.
///
/// For a single entity `[s, e)` vectorized over `len` characters this gives
/// `max(s - 1, 0)..min(e - 1, len)` (or nothing when that range is empty), not `s..e`.
pub fn label_spans(vector: &[u8]) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let runs = vector.iter().enumerate().chunk_by(|(_, v)| **v != 0);
    for (marked, run) in &runs {
        if !marked {
            continue;
        }
        let mut indices = run.map(|(i, _)| i);
        if let Some(first) = indices.next() {
            let last = indices.last().unwrap_or(first);
            spans.push(first..last + 1);
        }
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{QuickCheck, TestResult};
    use rstest::rstest;

    fn entity(label: Label, start: usize, end: usize) -> Entity {
        Entity::new(label, start, end, "")
    }

    #[test]
    fn test_no_entities_gives_zeros() {
        let vectors = SpanVectorizer::new(6, OverlapStrategy::default()).vectorize(&[]);
        assert_eq!(vectors.len(), 6);
        assert_eq!(vectors.iter().count(), 7);
        for (_, vector) in vectors.iter() {
            assert_eq!(vector, &[0, 0, 0, 0, 0, 0]);
        }
    }

    #[test]
    fn test_off_by_two_rule() {
        let vectors = SpanVectorizer::new(5, OverlapStrategy::LastWriteWins)
            .vectorize(&[entity(Label::System, 2, 4)]);
        assert_eq!(vectors.get(Label::System), &[0, 1, 1, 0, 0]);
        assert_eq!(vectors.get(Label::Goal), &[0, 0, 0, 0, 0]);
    }

    #[rstest]
    #[case(0, 3, vec![1, 1, 0, 0, 0])]
    #[case(1, 1, vec![0, 0, 0, 0, 0])]
    #[case(3, 10, vec![0, 0, 1, 1, 1])]
    #[case(7, 9, vec![0, 0, 0, 0, 0])]
    fn test_rule_at_the_edges(#[case] start: usize, #[case] end: usize, #[case] expected: Vec<u8>) {
        let vectors = SpanVectorizer::new(5, OverlapStrategy::LastWriteWins)
            .vectorize(&[entity(Label::User, start, end)]);
        assert_eq!(vectors.get(Label::User), expected.as_slice());
    }

    #[rstest]
    #[case(usize::MAX, 4)]
    #[case(usize::MAX - 1, usize::MAX)]
    #[case(i64::MAX as usize + 1, 3)]
    fn test_huge_offsets_mark_nothing(#[case] start: usize, #[case] end: usize) {
        let vectors = SpanVectorizer::new(5, OverlapStrategy::LastWriteWins)
            .vectorize(&[entity(Label::Goal, start, end)]);
        assert_eq!(vectors.get(Label::Goal), &[0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_huge_end_marks_to_the_last_character() {
        let vectors = SpanVectorizer::new(5, OverlapStrategy::LastWriteWins)
            .vectorize(&[entity(Label::Goal, 3, usize::MAX)]);
        assert_eq!(vectors.get(Label::Goal), &[0, 0, 1, 1, 1]);
    }

    #[test]
    fn test_last_write_wins() {
        // Input order is not start order: the entity at 6 is applied last.
        let entities = [
            entity(Label::Name, 6, 9),
            entity(Label::Name, 1, 4),
            entity(Label::Goal, 2, 3),
        ];
        let vectors =
            SpanVectorizer::new(10, OverlapStrategy::LastWriteWins).vectorize(&entities);
        assert_eq!(vectors.get(Label::Name), &[0, 0, 0, 0, 0, 1, 1, 1, 0, 0]);
        assert_eq!(vectors.get(Label::Goal), &[0, 1, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_union() {
        let entities = [entity(Label::Name, 6, 9), entity(Label::Name, 1, 4)];
        let vectors = SpanVectorizer::new(10, OverlapStrategy::Union).vectorize(&entities);
        assert_eq!(vectors.get(Label::Name), &[1, 1, 1, 0, 0, 1, 1, 1, 0, 0]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let entities = [entity(Label::Step, 3, 5), entity(Label::Step, 3, 8)];
        let vectors =
            SpanVectorizer::new(8, OverlapStrategy::LastWriteWins).vectorize(&entities);
        assert_eq!(vectors.get(Label::Step), &[0, 0, 1, 1, 1, 1, 1, 0]);
    }

    #[rstest]
    #[case(vec![], vec![])]
    #[case(vec![0, 0, 0], vec![])]
    #[case(vec![1, 1, 1], vec![0..3])]
    #[case(vec![0, 1, 1, 0, 1], vec![1..3, 4..5])]
    fn test_label_spans(#[case] vector: Vec<u8>, #[case] expected: Vec<Range<usize>>) {
        assert_eq!(label_spans(&vector), expected);
    }

    /// Vectorizing a single entity and reading back its run gives the shifted span, not the
    /// offsets the tool reported.
    #[test]
    fn test_spans_are_shifted_by_the_offset_convention() {
        fn shifted(len: u8, start: u8, end: u8) -> TestResult {
            let (len, start, end) = (len as usize, start as usize, end as usize);
            if start > end {
                return TestResult::discard();
            }
            let vectors = SpanVectorizer::new(len, OverlapStrategy::LastWriteWins)
                .vectorize(&[entity(Label::ExternalEntity, start, end)]);
            let spans = label_spans(vectors.get(Label::ExternalEntity));
            let lo = start.saturating_sub(1);
            let hi = end.saturating_sub(1).min(len);
            let expected = if lo < hi { vec![lo..hi] } else { vec![] };
            TestResult::from_bool(spans == expected)
        }
        let mut qc = QuickCheck::new().tests(2000);
        qc.quickcheck(shifted as fn(u8, u8, u8) -> TestResult)
    }

    #[test]
    fn test_property_marks_match_rule() {
        fn marks_match(len: u8, start: u8, end: u8) -> bool {
            let (len, start, end) = (len as usize, start as usize, end as usize);
            let vectors = SpanVectorizer::new(len, OverlapStrategy::LastWriteWins)
                .vectorize(&[entity(Label::Goal, start, end)]);
            let vector = vectors.get(Label::Goal);
            vector.len() == len
                && vector.iter().enumerate().all(|(i, v)| {
                    let expected = (start as i128 - 2) < i as i128 && (i as i128) < end as i128 - 1;
                    (*v == 1) == expected
                })
        }
        let mut qc = QuickCheck::new().tests(2000);
        qc.quickcheck(marks_match as fn(u8, u8, u8) -> bool)
    }

    #[rstest]
    #[case("union", OverlapStrategy::Union)]
    #[case("Last-Write-Wins", OverlapStrategy::LastWriteWins)]
    fn test_parse_overlap(#[case] input: &str, #[case] expected: OverlapStrategy) {
        assert_eq!(OverlapStrategy::from_str(input), Ok(expected));
    }

    #[test]
    fn test_serialize_label_vectors_in_label_order() {
        let vectors = SpanVectorizer::new(2, OverlapStrategy::LastWriteWins)
            .vectorize(&[entity(Label::System, 1, 3)]);
        let json = serde_json::to_string(&vectors).unwrap();
        assert!(json.starts_with(r#"{"UC-System":[1,1],"UC-Name":[0,0]"#));
        assert!(json.ends_with(r#""UC-ExternalEntity":[0,0]}"#));
    }
}
