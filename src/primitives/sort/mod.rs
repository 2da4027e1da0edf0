#![forbid(unsafe_code)]
//! In-place engineered quicksort driven by compare/swap callbacks.
//!
//! The algorithm is the Bentley–McIlroy three-way quicksort: median-of-three
//! pivots (ninther above 40 items), fat partitioning around equal keys and an
//! insertion sort below 7 items. It is not stable and has a quadratic worst
//! case on adversarial input.

use std::cmp::Ordering;

const INSERTION_CUTOFF: usize = 7;
const NINTHER_CUTOFF: usize = 40;

/// Index space a sort can permute.
pub trait SortTarget {
    /// Compares the items at positions `a` and `b`.
    fn compare(&mut self, a: usize, b: usize) -> Ordering;
    /// Exchanges the items at positions `a` and `b`.
    fn swap(&mut self, a: usize, b: usize);
}

/// Adapts shared state plus two plain callbacks into a [`SortTarget`].
pub struct Callbacks<S, C, W> {
    state: S,
    compare: C,
    swap: W,
}

impl<S, C, W> Callbacks<S, C, W>
where
    C: FnMut(&S, usize, usize) -> Ordering,
    W: FnMut(&mut S, usize, usize),
{
    /// Bundles `state` with its compare and swap callbacks.
    pub fn new(state: S, compare: C, swap: W) -> Self {
        Self {
            state,
            compare,
            swap,
        }
    }

    /// Returns the state after sorting.
    pub fn into_state(self) -> S {
        self.state
    }
}

impl<S, C, W> SortTarget for Callbacks<S, C, W>
where
    C: FnMut(&S, usize, usize) -> Ordering,
    W: FnMut(&mut S, usize, usize),
{
    fn compare(&mut self, a: usize, b: usize) -> Ordering {
        (self.compare)(&self.state, a, b)
    }

    fn swap(&mut self, a: usize, b: usize) {
        (self.swap)(&mut self.state, a, b)
    }
}

/// Sorts positions `0..n` of `target` ascending.
pub fn sort<T: SortTarget + ?Sized>(n: usize, target: &mut T) {
    if n > 1 {
        quicksort(target, 0, n);
    }
}

/// Sorts a callback-described index space of `n` items and returns the state.
pub fn sort_with<S, C, W>(n: usize, state: S, compare: C, swap: W) -> S
where
    C: FnMut(&S, usize, usize) -> Ordering,
    W: FnMut(&mut S, usize, usize),
{
    let mut target = Callbacks::new(state, compare, swap);
    sort(n, &mut target);
    target.into_state()
}

fn med3<T: SortTarget + ?Sized>(t: &mut T, a: usize, b: usize, c: usize) -> usize {
    if t.compare(a, b) == Ordering::Less {
        if t.compare(b, c) == Ordering::Less {
            b
        } else if t.compare(a, c) == Ordering::Less {
            c
        } else {
            a
        }
    } else if t.compare(b, c) == Ordering::Greater {
        b
    } else if t.compare(a, c) == Ordering::Greater {
        c
    } else {
        a
    }
}

fn vecswap<T: SortTarget + ?Sized>(t: &mut T, i: usize, j: usize, n: usize) {
    for k in 0..n {
        t.swap(i + k, j + k);
    }
}

fn insertion<T: SortTarget + ?Sized>(t: &mut T, a: usize, n: usize) {
    for pm in a + 1..a + n {
        let mut pl = pm;
        while pl > a && t.compare(pl - 1, pl) == Ordering::Greater {
            t.swap(pl, pl - 1);
            pl -= 1;
        }
    }
}

fn quicksort<T: SortTarget + ?Sized>(t: &mut T, mut a: usize, mut n: usize) {
    loop {
        if n < INSERTION_CUTOFF {
            insertion(t, a, n);
            return;
        }

        let mut pm = a + n / 2;
        if n > INSERTION_CUTOFF {
            let mut pl = a;
            let mut pn = a + n - 1;
            if n > NINTHER_CUTOFF {
                let d = n / 8;
                pl = med3(t, pl, pl + d, pl + 2 * d);
                pm = med3(t, pm - d, pm, pm + d);
                pn = med3(t, pn - 2 * d, pn - d, pn);
            }
            pm = med3(t, pl, pm, pn);
        }
        t.swap(a, pm);

        // pivot lives at `a`; [a+1, pa) and (pd, end) collect pivot-equal items
        let mut pa = a + 1;
        let mut pb = a + 1;
        let mut pc = a + n - 1;
        let mut pd = a + n - 1;
        loop {
            while pb <= pc {
                match t.compare(pb, a) {
                    Ordering::Greater => break,
                    Ordering::Equal => {
                        t.swap(pa, pb);
                        pa += 1;
                    }
                    Ordering::Less => {}
                }
                pb += 1;
            }
            while pb <= pc {
                match t.compare(pc, a) {
                    Ordering::Less => break,
                    Ordering::Equal => {
                        t.swap(pc, pd);
                        pd -= 1;
                    }
                    Ordering::Greater => {}
                }
                pc -= 1;
            }
            if pb > pc {
                break;
            }
            t.swap(pb, pc);
            pb += 1;
            pc -= 1;
        }

        let end = a + n;
        let s = (pa - a).min(pb - pa);
        vecswap(t, a, pb - s, s);
        let s = (pd - pc).min(end - pd - 1);
        vecswap(t, pb, end - s, s);

        let left = pb - pa;
        let right = pd - pc;
        if left <= right {
            if left > 1 {
                quicksort(t, a, left);
            }
            if right <= 1 {
                return;
            }
            a = end - right;
            n = right;
        } else {
            if right > 1 {
                quicksort(t, end - right, right);
            }
            if left <= 1 {
                return;
            }
            n = left;
        }
    }
}

/// Sorts a mutable slice through the engine; used by tests and benches.
pub fn sort_slice_by<T, F>(items: &mut [T], mut cmp: F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    struct SliceTarget<'a, T, F> {
        items: &'a mut [T],
        cmp: &'a mut F,
    }
    impl<T, F: FnMut(&T, &T) -> Ordering> SortTarget for SliceTarget<'_, T, F> {
        fn compare(&mut self, a: usize, b: usize) -> Ordering {
            (self.cmp)(&self.items[a], &self.items[b])
        }
        fn swap(&mut self, a: usize, b: usize) {
            self.items.swap(a, b);
        }
    }
    let n = items.len();
    let mut target = SliceTarget {
        items,
        cmp: &mut cmp,
    };
    sort(n, &mut target);
}
