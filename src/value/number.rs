use std::cmp::Ordering;

/// A numeric scalar widened to one of three representations.
///
/// Comparisons are by mathematical value: a negative signed value is below
/// every unsigned value, and floats compare exactly against integers.
#[derive(Copy, Clone, Debug)]
pub enum Number {
    /// Any signed integer kind.
    Int(i64),
    /// Any unsigned integer kind (and `Bool`).
    UInt(u64),
    /// `Float32`.
    Float(f32),
}

const TWO_POW_127: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;

impl Number {
    /// Exact integer value, if the number is integral.
    pub fn as_i128(self) -> Option<i128> {
        match self {
            Number::Int(v) => Some(v as i128),
            Number::UInt(v) => Some(v as i128),
            Number::Float(f) => {
                let f = f as f64;
                if f.is_finite() && f.fract() == 0.0 && f.abs() < TWO_POW_127 {
                    Some(f as i128)
                } else {
                    None
                }
            }
        }
    }

    /// Ordering by mathematical value; `None` when a NaN is involved.
    pub fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (Number::UInt(a), Number::UInt(b)) => Some(a.cmp(&b)),
            (Number::Int(a), Number::UInt(b)) => Some(cmp_signed_unsigned(a, b)),
            (Number::UInt(a), Number::Int(b)) => Some(cmp_signed_unsigned(b, a).reverse()),
            (Number::Float(a), Number::Float(b)) => a.partial_cmp(&b),
            (Number::Float(a), Number::Int(b)) => cmp_float_int(a, b as i128),
            (Number::Float(a), Number::UInt(b)) => cmp_float_int(a, b as i128),
            (Number::Int(a), Number::Float(b)) => {
                cmp_float_int(b, a as i128).map(Ordering::reverse)
            }
            (Number::UInt(a), Number::Float(b)) => {
                cmp_float_int(b, a as i128).map(Ordering::reverse)
            }
        }
    }

    /// Total ordering used by sorts: NaN sorts above every other number.
    pub fn sort_cmp(self, other: Number) -> Ordering {
        match self.compare(other) {
            Some(ord) => ord,
            None => match (self.is_nan(), other.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                _ => Ordering::Less,
            },
        }
    }

    /// Equality by mathematical value.
    pub fn num_eq(self, other: Number) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }

    /// True for a float NaN.
    pub fn is_nan(self) -> bool {
        matches!(self, Number::Float(f) if f.is_nan())
    }
}

fn cmp_signed_unsigned(a: i64, b: u64) -> Ordering {
    if a < 0 {
        Ordering::Less
    } else {
        (a as u64).cmp(&b)
    }
}

fn cmp_float_int(f: f32, i: i128) -> Option<Ordering> {
    let f = f as f64;
    if f.is_nan() {
        return None;
    }
    if f >= TWO_POW_127 {
        return Some(Ordering::Greater);
    }
    if f < -TWO_POW_127 {
        return Some(Ordering::Less);
    }
    let whole = f.trunc();
    match (whole as i128).cmp(&i) {
        Ordering::Equal => (f - whole).partial_cmp(&0.0),
        other => Some(other),
    }
}
