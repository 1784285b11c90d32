//! The Tolerance Principle: is a rule with `n` matches and `c` correct
//! predictions productive?
//!
//! Accepts iff `n == c`, or `c > 2` and `c > n/2` and the exception count
//! `n - c` stays within `n / ln n`.

pub fn tolerance_principle(n: u64, c: u64) -> bool {
    if n == c {
        return true;
    }
    let e = (n - c) as f64;
    let nf = n as f64;
    c > 2 && c as f64 > nf / 2.0 && e <= nf / nf.ln()
}

#[cfg(test)]
mod tests {
    use super::tolerance_principle;

    #[test]
    fn exact_match_always_accepts() {
        for n in [0, 1, 2, 5, 100] {
            assert!(tolerance_principle(n, n));
        }
    }

    #[test]
    fn small_n_accepts_only_perfection() {
        assert!(!tolerance_principle(1, 0));
        assert!(!tolerance_principle(2, 1));
        assert!(!tolerance_principle(2, 0));
    }

    #[test]
    fn minority_correct_rejects() {
        assert!(!tolerance_principle(10, 5));
        assert!(!tolerance_principle(100, 40));
    }

    #[test]
    fn few_exceptions_accept() {
        // n = 20: threshold is 20 / ln 20 ~= 6.68
        assert!(tolerance_principle(20, 14));
        assert!(!tolerance_principle(20, 13));
    }

    #[test]
    fn c_of_two_or_less_rejects_unless_exact() {
        assert!(!tolerance_principle(3, 2));
        assert!(tolerance_principle(2, 2));
    }
}
