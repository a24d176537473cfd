//! Enumeration of per-source index pools.
//!
//! All enumerators yield tuples in lexicographic order so a seeded sampler
//! reproduces the same draws.

/// Enumerates the `amount`-tuples drawable from `0..n`.
///
/// | order | duplicate | pool |
/// |---|---|---|
/// | true | true | product |
/// | true | false | permutations |
/// | false | true | combinations with replacement |
/// | false | false | combinations |
pub fn field_pool(n: usize, amount: usize, order: bool, duplicate: bool) -> Vec<Vec<usize>> {
    match (order, duplicate) {
        (true, true) => product(n, amount),
        (true, false) => permutations(n, amount),
        (false, true) => combinations_with_replacement(n, amount),
        (false, false) => combinations(n, amount),
    }
}

/// Size of [`field_pool`] without enumerating it; `None` on overflow.
pub fn pool_size(n: usize, amount: usize, order: bool, duplicate: bool) -> Option<usize> {
    match (order, duplicate) {
        (true, true) => n.checked_pow(u32::try_from(amount).ok()?),
        (true, false) => {
            if amount > n {
                return Some(0);
            }
            (0..amount).try_fold(1usize, |acc, i| acc.checked_mul(n - i))
        }
        (false, true) => {
            if n == 0 {
                return Some(usize::from(amount == 0));
            }
            binomial(n + amount - 1, amount)
        }
        (false, false) => binomial(n, amount),
    }
}

/// `C(n, k)` with overflow detection.
pub fn binomial(n: usize, k: usize) -> Option<usize> {
    if k > n {
        return Some(0);
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        acc = acc * (n - i) as u128 / (i + 1) as u128;
        if acc > usize::MAX as u128 {
            return None;
        }
    }
    usize::try_from(acc).ok()
}

fn product(n: usize, k: usize) -> Vec<Vec<usize>> {
    if k > 0 && n == 0 {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut current = vec![0; k];
    loop {
        out.push(current.clone());
        let mut pos = k;
        loop {
            if pos == 0 {
                return out;
            }
            pos -= 1;
            current[pos] += 1;
            if current[pos] < n {
                break;
            }
            current[pos] = 0;
        }
    }
}

fn permutations(n: usize, k: usize) -> Vec<Vec<usize>> {
    fn extend(n: usize, k: usize, used: &mut [bool], current: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if current.len() == k {
            out.push(current.clone());
            return;
        }
        for i in 0..n {
            if !used[i] {
                used[i] = true;
                current.push(i);
                extend(n, k, used, current, out);
                current.pop();
                used[i] = false;
            }
        }
    }

    let mut out = Vec::new();
    if k <= n {
        extend(n, k, &mut vec![false; n], &mut Vec::with_capacity(k), &mut out);
    }
    out
}

fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    combinations_of(&(0..n).collect::<Vec<_>>(), k)
}

fn combinations_with_replacement(n: usize, k: usize) -> Vec<Vec<usize>> {
    fn extend(n: usize, k: usize, start: usize, current: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if current.len() == k {
            out.push(current.clone());
            return;
        }
        for i in start..n {
            current.push(i);
            extend(n, k, i, current, out);
            current.pop();
        }
    }

    let mut out = Vec::new();
    extend(n, k, 0, &mut Vec::with_capacity(k), &mut out);
    out
}

/// All `k`-element combinations of `items`, preserving item order.
pub fn combinations_of<T: Clone>(items: &[T], k: usize) -> Vec<Vec<T>> {
    let n = items.len();
    let mut out = Vec::new();
    if k > n {
        return out;
    }
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        out.push(idx.iter().map(|&i| items[i].clone()).collect());
        let mut pos = k;
        loop {
            if pos == 0 {
                return out;
            }
            pos -= 1;
            if idx[pos] != pos + n - k {
                break;
            }
            if pos == 0 {
                return out;
            }
        }
        idx[pos] += 1;
        for j in (pos + 1)..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
}

/// Cartesian product of several lists.
pub fn cartesian<T: Clone>(lists: &[Vec<T>]) -> Vec<Vec<T>> {
    let mut out: Vec<Vec<T>> = vec![Vec::new()];
    for list in lists {
        let mut next = Vec::with_capacity(out.len() * list.len());
        for prefix in &out {
            for item in list {
                let mut row = prefix.clone();
                row.push(item.clone());
                next.push(row);
            }
        }
        out = next;
    }
    out
}
