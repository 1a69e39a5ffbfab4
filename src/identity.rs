use std::fmt;
use std::str::FromStr;

/// Platform backend a peer registers under. Each namespace owns its own
/// peer-id grammar; the set is closed and unknown names are rejected at
/// connection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Epic Online Services: hexadecimal account id.
    Epic,
    /// Steam: decimal SteamID64.
    Steam,
    /// GOG Galaxy: decimal account id.
    Galaxy,
    /// RallyHere: canonical UUID player id.
    RallyHere,
}

/// Error returned when a path segment names no known namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownNamespace(pub String);

impl fmt::Display for UnknownNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown namespace: {}", self.0)
    }
}

impl FromStr for Namespace {
    type Err = UnknownNamespace;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "epic" => Ok(Self::Epic),
            "steam" => Ok(Self::Steam),
            "galaxy" => Ok(Self::Galaxy),
            "rallyhere" => Ok(Self::RallyHere),
            other => Err(UnknownNamespace(other.to_string())),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Epic => "epic",
            Self::Steam => "steam",
            Self::Galaxy => "galaxy",
            Self::RallyHere => "rallyhere",
        };
        f.write_str(name)
    }
}

impl Namespace {
    /// Check a peer id against this namespace's grammar. Pure predicate,
    /// no side effects.
    #[must_use]
    pub fn is_identity_valid(&self, id: &str) -> bool {
        match self {
            Self::Epic => is_id_epic(id),
            Self::Steam | Self::Galaxy => is_id_decimal(id),
            Self::RallyHere => is_id_uuid(id),
        }
    }
}

/// Alphanumeric, and positive when read as base-16. Only the longest
/// leading run of hex digits counts toward the value, so `"1zz"` is valid
/// while `"0zz"` and `"zz"` are not.
fn is_id_epic(id: &str) -> bool {
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return false;
    }
    let hex_prefix = id.bytes().take_while(u8::is_ascii_hexdigit);
    let mut nonzero = false;
    let mut len = 0usize;
    for b in hex_prefix {
        len += 1;
        if b != b'0' {
            nonzero = true;
        }
    }
    len > 0 && nonzero
}

/// All decimal digits with at least one non-zero. Ids are kept as digit
/// strings, so arbitrary lengths are fine and there is no overflow cutoff.
fn is_id_decimal(id: &str) -> bool {
    !id.is_empty()
        && id.bytes().all(|b| b.is_ascii_digit())
        && id.bytes().any(|b| b != b'0')
}

/// Canonical UUID text form: 36 bytes, hyphens at offsets 8/13/18/23, hex
/// digits everywhere else, case-insensitive. Unlike the numeric grammars
/// there is no non-zero requirement, so the nil UUID is accepted.
fn is_id_uuid(id: &str) -> bool {
    let bytes = id.as_bytes();
    if bytes.len() != 36 {
        return false;
    }
    bytes.iter().enumerate().all(|(i, b)| match i {
        8 | 13 | 18 | 23 => *b == b'-',
        _ => b.is_ascii_hexdigit(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_parses_known_names() {
        assert_eq!("epic".parse::<Namespace>().unwrap(), Namespace::Epic);
        assert_eq!("steam".parse::<Namespace>().unwrap(), Namespace::Steam);
        assert_eq!("galaxy".parse::<Namespace>().unwrap(), Namespace::Galaxy);
        assert_eq!(
            "rallyhere".parse::<Namespace>().unwrap(),
            Namespace::RallyHere
        );
    }

    #[test]
    fn namespace_rejects_unknown_names() {
        assert!("".parse::<Namespace>().is_err());
        assert!("Steam".parse::<Namespace>().is_err());
        assert!("xbox".parse::<Namespace>().is_err());
        assert!("steam ".parse::<Namespace>().is_err());
    }

    #[test]
    fn epic_accepts_positive_hex() {
        let ns = Namespace::Epic;
        assert!(ns.is_identity_valid("1"));
        assert!(ns.is_identity_valid("deadbeef"));
        assert!(ns.is_identity_valid("DEADBEEF"));
        assert!(ns.is_identity_valid("0001a"));
    }

    #[test]
    fn epic_hex_prefix_counts_toward_value() {
        let ns = Namespace::Epic;
        // Trailing non-hex alphanumerics are tolerated if the hex prefix
        // is positive.
        assert!(ns.is_identity_valid("1zz"));
        assert!(!ns.is_identity_valid("0zz"));
        assert!(!ns.is_identity_valid("zz"));
    }

    #[test]
    fn epic_rejects_zero_and_bad_charset() {
        let ns = Namespace::Epic;
        assert!(!ns.is_identity_valid(""));
        assert!(!ns.is_identity_valid("0"));
        assert!(!ns.is_identity_valid("0000"));
        assert!(!ns.is_identity_valid("dead beef"));
        assert!(!ns.is_identity_valid("dead-beef"));
    }

    #[test]
    fn steam_and_galaxy_accept_positive_decimal() {
        for ns in [Namespace::Steam, Namespace::Galaxy] {
            assert!(ns.is_identity_valid("1"));
            assert!(ns.is_identity_valid("76561197960287930"));
            assert!(ns.is_identity_valid("0010"));
            // Longer than u64; digit strings have no overflow cutoff.
            assert!(ns.is_identity_valid("99999999999999999999999999"));
        }
    }

    #[test]
    fn steam_and_galaxy_reject_zero_and_non_decimal() {
        for ns in [Namespace::Steam, Namespace::Galaxy] {
            assert!(!ns.is_identity_valid(""));
            assert!(!ns.is_identity_valid("0"));
            assert!(!ns.is_identity_valid("000"));
            assert!(!ns.is_identity_valid("12a"));
            assert!(!ns.is_identity_valid("-1"));
            assert!(!ns.is_identity_valid("1.5"));
        }
    }

    #[test]
    fn rallyhere_accepts_canonical_uuid() {
        let ns = Namespace::RallyHere;
        assert!(ns.is_identity_valid("123e4567-e89b-12d3-a456-426614174000"));
        assert!(ns.is_identity_valid("123E4567-E89B-12D3-A456-426614174000"));
    }

    #[test]
    fn rallyhere_accepts_nil_uuid() {
        // The numeric namespaces reject zero-valued ids; the UUID grammar
        // has no such rule. This asymmetry is intentional.
        assert!(Namespace::RallyHere.is_identity_valid("00000000-0000-0000-0000-000000000000"));
    }

    #[test]
    fn rallyhere_rejects_non_canonical_forms() {
        let ns = Namespace::RallyHere;
        assert!(!ns.is_identity_valid(""));
        assert!(!ns.is_identity_valid("123e4567e89b12d3a456426614174000"));
        assert!(!ns.is_identity_valid("{123e4567-e89b-12d3-a456-426614174000}"));
        assert!(!ns.is_identity_valid("123e4567-e89b-12d3-a456-42661417400"));
        assert!(!ns.is_identity_valid("123e4567-e89b-12d3-a456-4266141740000"));
        assert!(!ns.is_identity_valid("123e4567+e89b+12d3+a456+426614174000"));
        assert!(!ns.is_identity_valid("123g4567-e89b-12d3-a456-426614174000"));
    }

    #[test]
    fn zero_ids_rejected_for_numeric_namespaces() {
        assert!(!Namespace::Epic.is_identity_valid("0"));
        assert!(!Namespace::Steam.is_identity_valid("0"));
        assert!(!Namespace::Galaxy.is_identity_valid("0"));
    }
}
