use std::fmt;
use std::str::FromStr;

/// A named field-tree profile of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Variant {
    Common,
    Full,
    List,
    Nav,
}

impl Variant {
    pub const ALL: [Variant; 4] = [Variant::Common, Variant::Full, Variant::List, Variant::Nav];

    /// Variants tried, in order, when the requested one is not defined.
    pub fn fallbacks(self) -> [Variant; 3] {
        match self {
            Variant::Common => [Variant::List, Variant::Full, Variant::Nav],
            Variant::List => [Variant::Common, Variant::Full, Variant::Nav],
            Variant::Full => [Variant::List, Variant::Common, Variant::Nav],
            Variant::Nav => [Variant::Common, Variant::List, Variant::Full],
        }
    }

    /// Whether the `common` tree is folded into this variant.
    pub fn merges_common(self) -> bool {
        matches!(self, Variant::Full | Variant::List)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Common => "common",
            Variant::Full => "full",
            Variant::List => "list",
            Variant::Nav => "nav",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown selection variant \"{0}\"")]
pub struct UnknownVariant(pub String);

impl FromStr for Variant {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "common" => Ok(Variant::Common),
            "full" => Ok(Variant::Full),
            "list" => Ok(Variant::List),
            "nav" => Ok(Variant::Nav),
            _ => Err(UnknownVariant(value.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallbacks_never_contain_the_requested_variant() {
        for variant in Variant::ALL {
            assert!(!variant.fallbacks().contains(&variant));
        }
    }

    #[test]
    fn only_full_and_list_merge_common() {
        let merging: Vec<_> = Variant::ALL
            .into_iter()
            .filter(|v| v.merges_common())
            .collect();
        assert_eq!(merging, vec![Variant::Full, Variant::List]);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("NAV".parse::<Variant>(), Ok(Variant::Nav));
        assert_eq!(
            "detail".parse::<Variant>(),
            Err(UnknownVariant("detail".into()))
        );
    }
}
