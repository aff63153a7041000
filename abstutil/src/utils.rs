use std::fmt::Write;

pub fn prettyprint_usize(x: usize) -> String {
    let num = format!("{}", x);
    let mut result = String::new();
    let mut i = num.len();
    for c in num.chars() {
        result.push(c);
        i -= 1;
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
    }
    result
}

/// Formats (key, count) pairs as "k1: c1, k2: c2".
pub fn plain_list_names<K: std::fmt::Display, I: IntoIterator<Item = (K, usize)>>(
    pairs: I,
) -> String {
    let mut s = String::new();
    for (idx, (k, v)) in pairs.into_iter().enumerate() {
        if idx != 0 {
            s.push_str(", ");
        }
        write!(s, "{}: {}", k, v).unwrap();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty() {
        assert_eq!(prettyprint_usize(1234567), "1,234,567");
        assert_eq!(prettyprint_usize(12), "12");
        assert_eq!(plain_list_names(vec![(0, 3), (2, 1)]), "0: 3, 2: 1");
    }
}
