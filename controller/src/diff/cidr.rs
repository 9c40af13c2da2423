use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Reduces a CIDR block to its network form, zeroing the host bits. Returns `None` if `cidr`
/// is not an `address/prefix` pair.
pub fn canonicalize_cidr(cidr: &str) -> Option<String> {
    let (address, prefix) = cidr.trim().split_once('/')?;
    let prefix: u32 = prefix.parse().ok()?;

    let network: IpAddr = match address.parse::<IpAddr>().ok()? {
        IpAddr::V4(v4) if prefix <= 32 => {
            let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
            Ipv4Addr::from(u32::from(v4) & mask).into()
        }
        IpAddr::V6(v6) if prefix <= 128 => {
            let mask = u128::MAX.checked_shl(128 - prefix).unwrap_or(0);
            Ipv6Addr::from(u128::from(v6) & mask).into()
        }
        _ => return None,
    };

    Some(format!("{}/{}", network, prefix))
}

/// Canonicalizes every block in `cidrs`. Blocks that cannot be parsed are kept verbatim so they
/// still take part in comparisons.
pub fn canonicalize_cidrs<S: AsRef<str>>(cidrs: &[S]) -> BTreeSet<String> {
    cidrs
        .iter()
        .map(|c| canonicalize_cidr(c.as_ref()).unwrap_or_else(|| c.as_ref().to_string()))
        .collect()
}

/// Whether two CIDR lists describe the same set of networks.
pub fn cidrs_equal<A: AsRef<str>, B: AsRef<str>>(a: &[A], b: &[B]) -> bool {
    canonicalize_cidrs(a) == canonicalize_cidrs(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_cidr() {
        let test_cases = vec![
            ("0.0.0.10/24", Some("0.0.0.0/24")),
            ("10.1.2.3/8", Some("10.0.0.0/8")),
            ("1.1.1.1/16", Some("1.1.0.0/16")),
            ("203.0.113.7/32", Some("203.0.113.7/32")),
            ("203.0.113.7/0", Some("0.0.0.0/0")),
            ("2001:db8::1/32", Some("2001:db8::/32")),
            ("10.0.0.0/33", None),
            ("10.0.0.0", None),
            ("not-a-cidr/8", None),
        ];

        for (input, expected) in test_cases {
            assert_eq!(canonicalize_cidr(input).as_deref(), expected, "{}", input);
        }
    }

    #[test]
    fn test_cidrs_equal() {
        let test_cases: Vec<(Vec<&str>, Vec<&str>, bool)> = vec![
            (vec!["0.0.0.10/24"], vec!["0.0.0.0/24"], true),
            (
                vec!["0.0.0.0/24", "1.0.0.0/8"],
                vec!["0.0.0.10/24", "0.0.0.255/24", "1.1.1.1/16"],
                false,
            ),
            (vec!["10.0.0.0/8", "0.0.0.0/0"], vec!["0.0.0.0/0", "10.2.0.0/8"], true),
            (vec![], vec![], true),
            (vec!["0.0.0.0/0"], vec![], false),
        ];

        for (a, b, expected) in test_cases {
            assert_eq!(cidrs_equal(&a, &b), expected, "{:?} vs {:?}", a, b);
        }
    }
}
