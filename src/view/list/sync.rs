use {
    crate::view::list::ListDiff,
    std::{
        collections::{HashMap, HashSet},
        hash::Hash,
    },
};

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// Computes the remove/insert patch turning `old` into `new`.
///
/// Items are matched by `key`, which must be unique within each list. The
/// longest run of matched items that keeps its relative order stays in place,
/// every other item is removed and/or inserted. Removals come first, as
/// maximal runs in descending position, followed by insertions as maximal
/// runs in ascending position, so each message is valid against the list the
/// previous one left behind.
pub fn diff<T, K, F>(old: &[T], new: &[T], key: F) -> Vec<ListDiff<T>>
where
    T: Clone + Send + Sync + 'static,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let new_pos: HashMap<K, usize> = new.iter().enumerate().map(|(i, x)| (key(x), i)).collect();

    // (old index, new index) of every item present on both sides
    let matched: Vec<(usize, usize)> = old
        .iter()
        .enumerate()
        .filter_map(|(i, x)| new_pos.get(&key(x)).map(|&j| (i, j)))
        .collect();

    let keep = longest_increasing(&matched.iter().map(|&(_, j)| j).collect::<Vec<_>>());
    let kept_old: HashSet<usize> = matched.iter().zip(keep.iter()).filter(|(_, k)| **k).map(|(&(i, _), _)| i).collect();
    let kept_new: HashSet<usize> = matched.iter().zip(keep.iter()).filter(|(_, k)| **k).map(|(&(_, j), _)| j).collect();

    let mut patch = Vec::new();

    for (start, end) in runs(old.len(), |i| !kept_old.contains(&i)).into_iter().rev() {
        patch.push(ListDiff::Remove {
            idx: start,
            vals: old[start..end].to_vec(),
        });
    }

    for (start, end) in runs(new.len(), |j| !kept_new.contains(&j)) {
        patch.push(ListDiff::Insert {
            idx: start,
            vals: new[start..end].to_vec(),
        });
    }

    patch
}

/// Patches `live` into `new` in place and returns the applied messages.
pub fn diff_apply<T, K, F>(live: &mut Vec<T>, new: &[T], key: F) -> Vec<ListDiff<T>>
where
    T: Clone + Send + Sync + 'static,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let patch = diff(live, new, key);
    for step in patch.iter() {
        step.apply(live);
    }
    patch
}

/// Maximal `[start, end)` runs of indices below `len` selected by `pred`.
fn runs(len: usize, pred: impl Fn(usize) -> bool) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < len {
        if pred(i) {
            let start = i;
            while i < len && pred(i) {
                i += 1;
            }
            out.push((start, i));
        } else {
            i += 1;
        }
    }
    out
}

/// Marks one longest strictly increasing subsequence of `seq`.
fn longest_increasing(seq: &[usize]) -> Vec<bool> {
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];

    for i in 0..seq.len() {
        let pos = tails.partition_point(|&t| seq[t] < seq[i]);
        prev[i] = if pos > 0 { Some(tails[pos - 1]) } else { None };
        if pos == tails.len() {
            tails.push(i);
        } else {
            tails[pos] = i;
        }
    }

    let mut member = vec![false; seq.len()];
    let mut cur = tails.last().copied();
    while let Some(i) = cur {
        member[i] = true;
        cur = prev[i];
    }
    member
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
