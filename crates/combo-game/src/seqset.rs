//! Prefix-trie sets of piece sequences.

use std::fmt::{self, Display};
use std::sync::Arc;

use anyhow::{ensure, Context, Result};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::piece::{Piece, PieceSet, NONEMPTY_PIECES};

/// An immutable set of piece sequences, defined by prefixes.
///
/// A set holding the prefix `[T O I]` contains `[T O I]`, `[T O I T]`,
/// `[T O I Z Z]` and so on. This is the natural shape for remembering
/// sequences that fail from a state: every extension of a failing prefix
/// also fails.
///
/// Nodes form a 7-ary trie:
///
/// - `Empty` — no sequences (the absent child).
/// - `All` — every sequence, including the empty one. Adding a zero-length
///   prefix collapses a node to `All` and anything below it is redundant.
/// - `Perm(bag)` — exactly the sequences a 7-bag randomizer can still emit
///   from the given bag state. These are the only nodes whose language is
///   infinite; their children are derived from the bag on demand (piece `p`
///   leads to `Perm(bag ∪ {p})`, with a full bag treated as empty), so the
///   cyclic 128-node permutation graph never materializes.
/// - `Node` — an interior node with up to 7 children indexed by piece.
///
/// `All` and `Perm(bag)` are plain values, so the canonical-singleton
/// sharing the algebra relies on is just cheap variant equality, and
/// results of [`union`](SeqSet::union) / [`intersection`](SeqSet::intersection)
/// share subtrees with their inputs through [`Arc`].
#[derive(Debug, Default, Clone)]
pub enum SeqSet {
    #[default]
    Empty,
    All,
    Perm(PieceSet),
    Node(Arc<[SeqSet; 7]>),
}

/// The set of all sequences a 7-bag randomizer can produce starting from
/// the given bag state.
#[must_use]
pub const fn permutations(bag_used: PieceSet) -> SeqSet {
    SeqSet::Perm(bag_used)
}

impl SeqSet {
    /// Builds a set from a list of prefixes. Shorter prefixes dominate
    /// longer ones, so they are inserted first.
    #[must_use]
    pub fn from_prefixes(prefixes: &[&[Piece]]) -> SeqSet {
        let mut sorted = prefixes.to_vec();
        sorted.sort_by_key(|p| p.len());
        let mut set = SeqSet::Empty;
        for prefix in sorted {
            set.add_prefix(prefix);
        }
        set
    }

    /// Builds an interior node from explicit children, one per piece in
    /// canonical order.
    #[must_use]
    pub fn prepended(children: [SeqSet; 7]) -> SeqSet {
        SeqSet::Node(Arc::new(children))
    }

    /// Adds a prefix to the set. A zero-length prefix makes this the
    /// all-sequences set.
    ///
    /// Panics when the prefix contains an empty piece or when called on a
    /// permutation node, which is immutable by construction.
    pub fn add_prefix(&mut self, prefix: &[Piece]) {
        match self {
            SeqSet::All => return,
            SeqSet::Perm(_) => panic!("permutation sequence sets cannot be modified"),
            _ => {}
        }
        let Some((&first, rest)) = prefix.split_first() else {
            *self = SeqSet::All;
            return;
        };
        let idx = first.index();
        if matches!(self, SeqSet::Empty) {
            *self = SeqSet::Node(Arc::new(Default::default()));
        }
        let SeqSet::Node(children) = self else {
            unreachable!()
        };
        let children = Arc::make_mut(children);
        if rest.is_empty() {
            // The leaf is the shared All value, never an interior node.
            children[idx] = SeqSet::All;
        } else {
            children[idx].add_prefix(rest);
        }
    }

    /// Whether the sequence is in the set. The empty sequence is contained
    /// only by `All` and permutation nodes.
    ///
    /// Panics when the sequence contains an empty piece.
    #[must_use]
    pub fn contains(&self, sequence: &[Piece]) -> bool {
        match self {
            SeqSet::Empty => false,
            SeqSet::All => true,
            node => match sequence.split_first() {
                None => matches!(node, SeqSet::Perm(_)),
                Some((&first, rest)) => node.child(first.index()).contains(rest),
            },
        }
    }

    /// The union of two sets. The result shares structure with both inputs.
    #[must_use]
    pub fn union(&self, other: &SeqSet) -> SeqSet {
        match (self, other) {
            (SeqSet::Empty, x) | (x, SeqSet::Empty) => x.clone(),
            (SeqSet::All, _) | (_, SeqSet::All) => SeqSet::All,
            (SeqSet::Perm(a), SeqSet::Perm(b)) if a == b => SeqSet::Perm(*a),
            _ => {
                let mut children: [SeqSet; 7] = Default::default();
                for (idx, slot) in children.iter_mut().enumerate() {
                    *slot = self.child(idx).union(&other.child(idx));
                }
                SeqSet::Node(Arc::new(children))
            }
        }
    }

    /// The intersection of two sets, collapsing to `Empty` when no child
    /// survives. The result shares structure with both inputs.
    ///
    /// Intersecting a permutation node with a finite trie yields the
    /// sequences of the trie that are consistent with the bag's 7-bag law,
    /// which is the primitive the scorers are built on.
    #[must_use]
    pub fn intersection(&self, other: &SeqSet) -> SeqSet {
        match (self, other) {
            (SeqSet::Empty, _) | (_, SeqSet::Empty) => SeqSet::Empty,
            (SeqSet::All, x) | (x, SeqSet::All) => x.clone(),
            (SeqSet::Perm(a), SeqSet::Perm(b)) if a == b => SeqSet::Perm(*a),
            _ => {
                let mut children: [SeqSet; 7] = Default::default();
                let mut any = false;
                for (idx, slot) in children.iter_mut().enumerate() {
                    *slot = self.child(idx).intersection(&other.child(idx));
                    any |= !matches!(slot, SeqSet::Empty);
                }
                if any {
                    SeqSet::Node(Arc::new(children))
                } else {
                    SeqSet::Empty
                }
            }
        }
    }

    /// The number of sequences of exactly `length` pieces in the set.
    #[must_use]
    pub fn size(&self, length: u32) -> u64 {
        match self {
            SeqSet::Empty => 0,
            SeqSet::All => 7u64.pow(length),
            SeqSet::Perm(bag) => {
                // Choices shrink by one per draw and reset to 7 when the
                // bag refills.
                let mut choices = 7 - bag.len() as u64;
                if choices == 0 {
                    choices = 7;
                }
                let mut prod = 1u64;
                for _ in 0..length {
                    prod *= choices;
                    choices -= 1;
                    if choices == 0 {
                        choices = 7;
                    }
                }
                prod
            }
            SeqSet::Node(children) => {
                if length == 0 {
                    return 0;
                }
                children.iter().map(|c| c.size(length - 1)).sum()
            }
        }
    }

    /// Every prefix path leading to an `All` leaf, in child order.
    /// Permutation nodes are skipped: their language is implicit.
    #[must_use]
    pub fn prefixes(&self) -> Vec<Vec<Piece>> {
        let mut all = Vec::new();
        let mut path = Vec::new();
        self.collect_prefixes(&mut path, &mut all);
        all
    }

    fn collect_prefixes(&self, path: &mut Vec<Piece>, all: &mut Vec<Vec<Piece>>) {
        match self {
            SeqSet::Empty | SeqSet::Perm(_) => {}
            SeqSet::All => all.push(path.clone()),
            SeqSet::Node(children) => {
                for (idx, child) in children.iter().enumerate() {
                    path.push(NONEMPTY_PIECES[idx]);
                    child.collect_prefixes(path, all);
                    path.pop();
                }
            }
        }
    }

    /// The child reached on the piece with the given index. For
    /// permutation nodes the child is derived from the bag state.
    fn child(&self, idx: usize) -> SeqSet {
        match self {
            SeqSet::Empty | SeqSet::All => SeqSet::Empty,
            SeqSet::Perm(bag) => {
                let bag = if bag.len() == 7 {
                    PieceSet::default()
                } else {
                    *bag
                };
                let piece = NONEMPTY_PIECES[idx];
                if bag.contains(piece) {
                    SeqSet::Empty
                } else {
                    SeqSet::Perm(bag.add(piece))
                }
            }
            SeqSet::Node(children) => children[idx].clone(),
        }
    }

    fn is_spine_empty(&self) -> bool {
        match self {
            SeqSet::Empty => true,
            SeqSet::Node(children) => children.iter().all(SeqSet::is_spine_empty),
            SeqSet::All | SeqSet::Perm(_) => false,
        }
    }

    /// Encodes the set as a preorder byte stream: `0x80` for `All`,
    /// `0xFF` plus the bag byte for a permutation node, otherwise a
    /// presence bitmap over the 7 children in the low bits followed by the
    /// present children in ascending order.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_to(&mut buf);
        buf
    }

    fn encode_to(&self, buf: &mut Vec<u8>) {
        match self {
            SeqSet::All => buf.push(0x80),
            SeqSet::Perm(bag) => {
                buf.push(0xFF);
                buf.push(bag.bits());
            }
            SeqSet::Empty => buf.push(0x00),
            SeqSet::Node(children) => {
                let mut bitmap = 0u8;
                for (idx, child) in children.iter().enumerate() {
                    if !matches!(child, SeqSet::Empty) {
                        bitmap |= 1 << idx;
                    }
                }
                buf.push(bitmap);
                for child in children.iter() {
                    if !matches!(child, SeqSet::Empty) {
                        child.encode_to(buf);
                    }
                }
            }
        }
    }

    /// Decodes a byte stream produced by [`encode`](SeqSet::encode).
    pub fn decode(data: &[u8]) -> Result<SeqSet> {
        let mut cursor = data;
        let set = Self::decode_node(&mut cursor)?;
        ensure!(
            cursor.is_empty(),
            "{} trailing bytes after sequence set",
            cursor.len()
        );
        Ok(set)
    }

    fn decode_node(data: &mut &[u8]) -> Result<SeqSet> {
        let (&tag, rest) = data.split_first().context("truncated sequence set")?;
        *data = rest;
        if tag == 0x80 {
            return Ok(SeqSet::All);
        }
        if tag == 0xFF {
            let (&bag, rest) = data.split_first().context("truncated permutation bag")?;
            *data = rest;
            return Ok(SeqSet::Perm(PieceSet::from_bits(bag)));
        }
        ensure!(tag & 0x80 == 0, "invalid sequence set node tag {tag:#04x}");
        if tag == 0 {
            return Ok(SeqSet::Empty);
        }
        let mut children: [SeqSet; 7] = Default::default();
        for (idx, slot) in children.iter_mut().enumerate() {
            if tag & (1 << idx) != 0 {
                *slot = Self::decode_node(data)?;
            }
        }
        Ok(SeqSet::Node(Arc::new(children)))
    }
}

/// Prefix-by-prefix equality. An absent child and an interior node with no
/// surviving children are the same set; `All` equals only `All` and a
/// permutation node equals only the permutation node of the same bag.
impl PartialEq for SeqSet {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SeqSet::All, SeqSet::All) => true,
            (SeqSet::Perm(a), SeqSet::Perm(b)) => a == b,
            (SeqSet::Empty, x) | (x, SeqSet::Empty) => x.is_spine_empty(),
            (SeqSet::Node(a), SeqSet::Node(b)) => a.iter().zip(b.iter()).all(|(x, y)| x == y),
            _ => false,
        }
    }
}

impl Eq for SeqSet {}

impl Display for SeqSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeqSet::All => write!(f, "{{prefixes=all}}"),
            SeqSet::Perm(bag) => write!(f, "{{permutations of {bag}}}"),
            _ => {
                write!(f, "{{prefixes=[")?;
                for (idx, prefix) in self.prefixes().into_iter().enumerate() {
                    if idx > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "[")?;
                    for (pidx, p) in prefix.into_iter().enumerate() {
                        if pidx > 0 {
                            write!(f, " ")?;
                        }
                        write!(f, "{p}")?;
                    }
                    write!(f, "]")?;
                }
                write!(f, "]}}")
            }
        }
    }
}

impl Serialize for SeqSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.encode())
    }
}

impl<'de> Deserialize<'de> for SeqSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SeqSetVisitor;

        impl<'de> Visitor<'de> for SeqSetVisitor {
            type Value = SeqSet;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a sequence set byte stream")
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<SeqSet, E> {
                SeqSet::decode(v).map_err(de::Error::custom)
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<SeqSet, E> {
                self.visit_bytes(&v)
            }

            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<SeqSet, A::Error> {
                let mut bytes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(b) = seq.next_element::<u8>()? {
                    bytes.push(b);
                }
                self.visit_bytes(&bytes)
            }
        }

        deserializer.deserialize_byte_buf(SeqSetVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::all_piece_sets;
    use super::Piece::{I, J, L, O, S, T, Z};

    #[test]
    fn test_contains() {
        let set = SeqSet::from_prefixes(&[&[I, J, O], &[S, S, S, T, T]]);

        struct Case {
            desc: &'static str,
            seq: &'static [Piece],
            want: bool,
        }
        let cases = [
            Case {
                desc: "has prefix",
                seq: &[I, J, O, Z, L],
                want: true,
            },
            Case {
                desc: "exact prefix match",
                seq: &[S, S, S, T, T],
                want: true,
            },
            Case {
                desc: "not a match",
                seq: &[S, S, S, Z, L],
                want: false,
            },
            Case {
                desc: "empty sequence",
                seq: &[],
                want: false,
            },
        ];
        for case in cases {
            assert_eq!(set.contains(case.seq), case.want, "{}", case.desc);
        }
    }

    #[test]
    fn test_contains_extensions() {
        let prefix = [Z, T, O];
        let set = SeqSet::from_prefixes(&[&prefix]);
        assert!(set.contains(&prefix));
        for extra in NONEMPTY_PIECES {
            let mut extended = prefix.to_vec();
            extended.push(extra);
            assert!(set.contains(&extended), "extension by {extra} must match");
        }
        assert!(!set.contains(&[Z, T]));
    }

    #[test]
    fn test_prefixes() {
        let cases: [(&str, &[&[Piece]]); 3] = [
            ("two seqs", &[&[I, J, O], &[S, S, S, T, T]]),
            ("no seqs", &[]),
            ("all seqs", &[&[]]),
        ];
        for (desc, seqs) in cases {
            let set = SeqSet::from_prefixes(seqs);
            let mut got = set.prefixes();
            let mut want: Vec<Vec<Piece>> = seqs.iter().map(|s| s.to_vec()).collect();
            got.sort();
            want.sort();
            assert_eq!(got, want, "{desc}");
        }
    }

    #[test]
    fn test_size() {
        struct Case {
            desc: &'static str,
            seqs: &'static [&'static [Piece]],
            length: u32,
            want: u64,
        }
        let cases = [
            Case {
                desc: "two sequences",
                seqs: &[&[I, J, O], &[S, S, S, T, T]],
                length: 5,
                want: 7 * 7 + 1,
            },
            Case {
                desc: "length 0 without the empty prefix",
                seqs: &[&[I, J, O]],
                length: 0,
                want: 0,
            },
            Case {
                desc: "length 0 with the empty prefix",
                seqs: &[&[]],
                length: 0,
                want: 1,
            },
        ];
        for case in cases {
            let set = SeqSet::from_prefixes(case.seqs);
            assert_eq!(set.size(case.length), case.want, "{}", case.desc);
        }
    }

    #[test]
    fn test_equals_dedups_prefixes() {
        // A longer prefix below an existing shorter one is redundant in
        // either insertion order.
        let base = SeqSet::from_prefixes(&[&[I, J, O]]);
        let shorter_first = SeqSet::from_prefixes(&[&[I, J, O], &[I, J, O, T]]);
        let longer_first = SeqSet::from_prefixes(&[&[I, J, O, T], &[I, J, O]]);
        assert_eq!(base, shorter_first);
        assert_eq!(base, longer_first);
        assert_ne!(base, SeqSet::from_prefixes(&[&[I, J, S]]));
        assert_eq!(SeqSet::Empty, SeqSet::from_prefixes(&[]));
        assert_ne!(SeqSet::Empty, SeqSet::All);
    }

    #[test]
    fn test_union() {
        let cases: [(&str, &[&[Piece]], &[&[Piece]], &[&[Piece]]); 3] = [
            ("strict subset", &[&[I, J, O]], &[&[I, J, O, T]], &[&[I, J, O]]),
            ("strict superset", &[&[I, J, O, T]], &[&[I, J, O]], &[&[I, J, O]]),
            (
                "partial overlap",
                &[&[I, J, O]],
                &[&[I, Z, O]],
                &[&[I, J, O], &[I, Z, O]],
            ),
        ];
        for (desc, seqs1, seqs2, want) in cases {
            let got = SeqSet::from_prefixes(seqs1).union(&SeqSet::from_prefixes(seqs2));
            assert_eq!(got, SeqSet::from_prefixes(want), "{desc}");
        }
    }

    #[test]
    fn test_intersection() {
        let cases: [(&str, &[&[Piece]], &[&[Piece]], &[&[Piece]]); 3] = [
            (
                "strict subset",
                &[&[I, J, O]],
                &[&[I, J, O, T]],
                &[&[I, J, O, T]],
            ),
            (
                "strict superset",
                &[&[I, J, O, T]],
                &[&[I, J, O]],
                &[&[I, J, O, T]],
            ),
            ("partial overlap", &[&[I, J, O]], &[&[I, Z, O]], &[]),
        ];
        for (desc, seqs1, seqs2, want) in cases {
            let got = SeqSet::from_prefixes(seqs1).intersection(&SeqSet::from_prefixes(seqs2));
            assert_eq!(got, SeqSet::from_prefixes(want), "{desc}");
        }
    }

    #[test]
    fn test_union_intersection_membership() {
        let a = SeqSet::from_prefixes(&[&[I, J], &[S, S, S]]);
        let b = SeqSet::from_prefixes(&[&[I], &[T, O]]);
        let union = a.union(&b);
        let intersection = a.intersection(&b);

        let probes: &[&[Piece]] = &[
            &[I, J, T],
            &[I, L, L],
            &[S, S, S, Z],
            &[T, O, I],
            &[Z, Z, Z],
        ];
        for &x in probes {
            assert_eq!(
                union.contains(x),
                a.contains(x) || b.contains(x),
                "union membership mismatch for {x:?}"
            );
            assert_eq!(
                intersection.contains(x),
                a.contains(x) && b.contains(x),
                "intersection membership mismatch for {x:?}"
            );
        }
    }

    #[test]
    fn test_permutation_sizes() {
        for bag in all_piece_sets() {
            assert_eq!(
                permutations(bag).size(7),
                5040,
                "bag {bag} should admit 7! sequences of length 7"
            );
        }
    }

    #[test]
    fn test_permutations_match_7_bag_dfs() {
        // Enumerate every legal draw sequence of a fixed length directly
        // from the bag law and compare against trie membership.
        fn enumerate(bag: PieceSet, len: usize, prefix: &mut Vec<Piece>, out: &mut Vec<Vec<Piece>>) {
            if prefix.len() == len {
                out.push(prefix.clone());
                return;
            }
            let bag = if bag.len() == 7 { PieceSet::default() } else { bag };
            for p in bag.inverted().to_vec() {
                prefix.push(p);
                enumerate(bag.add(p), len, prefix, out);
                prefix.pop();
            }
        }

        for bag in [
            PieceSet::default(),
            PieceSet::new(&[T, L, J, S, Z, O]),
            PieceSet::new(&[I, O]),
            PieceSet::default().inverted().inverted(), // empty again
        ] {
            let perm = permutations(bag);
            let mut legal = Vec::new();
            enumerate(bag, 3, &mut Vec::new(), &mut legal);
            assert_eq!(legal.len() as u64, perm.size(3), "bag {bag}");

            let legal_set: std::collections::HashSet<Vec<Piece>> = legal.into_iter().collect();
            let mut all = Vec::new();
            fn cartesian(len: usize, prefix: &mut Vec<Piece>, out: &mut Vec<Vec<Piece>>) {
                if prefix.len() == len {
                    out.push(prefix.clone());
                    return;
                }
                for p in NONEMPTY_PIECES {
                    prefix.push(p);
                    cartesian(len, prefix, out);
                    prefix.pop();
                }
            }
            cartesian(3, &mut Vec::new(), &mut all);
            for seq in all {
                assert_eq!(
                    perm.contains(&seq),
                    legal_set.contains(&seq),
                    "bag {bag}, sequence {seq:?}"
                );
            }
        }
    }

    #[test]
    fn test_permutation_intersection_filters_bag_law() {
        // T twice in a row can never come out of one bag that already used T.
        let bag = PieceSet::new(&[T]);
        let set = SeqSet::from_prefixes(&[&[T, T], &[L, J]]);
        let filtered = permutations(bag).intersection(&set);
        assert!(!filtered.contains(&[T, T, I]));
        assert!(filtered.contains(&[L, J, I]));
    }

    #[test]
    #[should_panic(expected = "cannot be modified")]
    fn test_permutations_are_immutable() {
        let mut perm = permutations(PieceSet::default());
        perm.add_prefix(&[T]);
    }

    #[test]
    fn test_encode_decode() {
        let mut sets = vec![
            SeqSet::Empty,
            SeqSet::All,
            permutations(PieceSet::default()),
            permutations(PieceSet::new(&[T, I])),
            permutations(PieceSet::default().inverted()),
            SeqSet::from_prefixes(&[&[I, J, O]]),
            SeqSet::from_prefixes(&[&[I, J, O], &[S, S, S, T, T], &[Z]]),
        ];
        // A mixed tree with a permutation child.
        let mut children: [SeqSet; 7] = Default::default();
        children[T.index()] = permutations(PieceSet::new(&[T]));
        children[I.index()] = SeqSet::All;
        sets.push(SeqSet::prepended(children));

        for set in &sets {
            let bytes = set.encode();
            let decoded = SeqSet::decode(&bytes).expect("decode failed");
            assert_eq!(&decoded, set, "decode(encode(s)) != s");
            assert_eq!(
                decoded.encode(),
                bytes,
                "re-encoding is not bitwise identical"
            );
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(SeqSet::decode(&[]).is_err());
        assert!(SeqSet::decode(&[0xFF]).is_err(), "permutation without bag");
        assert!(SeqSet::decode(&[0x81]).is_err(), "unknown tag");
        assert!(SeqSet::decode(&[0x01]).is_err(), "missing child");
        assert!(
            SeqSet::decode(&[0x80, 0x80]).is_err(),
            "trailing bytes must be rejected"
        );
    }
}
