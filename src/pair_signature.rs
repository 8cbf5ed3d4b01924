//! Discordant pair signature classes, library pairing types and pair orientation categories
//!

use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumIter, FromRepr};

/// Discordant-pair signature class, taken from the aligner's 3-letter pair classification tag
///
/// The first letter describes mate orientation (A: expected, B: unexpected), the second the mate
/// ordering and the third the insert size (A: normal, B: too small, C: too large). Pairs with mates
/// on different chromosomes are all grouped under `Cxx`.
///
/// The concordant class `AAA` is deliberately not representable.
///
#[derive(Clone, Copy, Debug, Display, EnumCount, EnumIter, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum PairSignature {
    #[strum(to_string = "AAC")]
    Aac,
    #[strum(to_string = "AAB")]
    Aab,
    #[strum(to_string = "ABA")]
    Aba,
    #[strum(to_string = "ABB")]
    Abb,
    #[strum(to_string = "ABC")]
    Abc,
    #[strum(to_string = "BAA")]
    Baa,
    #[strum(to_string = "BBA")]
    Bba,
    #[strum(to_string = "BAB")]
    Bab,
    #[strum(to_string = "BBB")]
    Bbb,
    #[strum(to_string = "BAC")]
    Bac,
    #[strum(to_string = "BBC")]
    Bbc,
    #[strum(to_string = "Cxx")]
    Cxx,
}

impl PairSignature {
    /// Parse a signature tag, accepting `C**` as an alias of `Cxx`
    ///
    pub fn from_tag(tag: &str) -> Option<Self> {
        use PairSignature::*;
        let sig = match tag {
            "AAC" => Aac,
            "AAB" => Aab,
            "ABA" => Aba,
            "ABB" => Abb,
            "ABC" => Abc,
            "BAA" => Baa,
            "BBA" => Bba,
            "BAB" => Bab,
            "BBB" => Bbb,
            "BAC" => Bac,
            "BBC" => Bbc,
            "Cxx" | "C**" => Cxx,
            _ => return None,
        };
        Some(sig)
    }

    pub fn is_cross_chrom(&self) -> bool {
        *self == PairSignature::Cxx
    }

    /// Structural variant types consistent with this signature, used in reports
    ///
    pub fn sv_type_label(&self) -> &'static str {
        use PairSignature::*;
        match self {
            Cxx => "CTX",
            Aac => "DEL/ITX",
            Baa | Bba | Bab | Bbb | Bac | Bbc => "INV/ITX",
            Aab | Aba | Abb | Abc => "DUP/INS/ITX",
        }
    }

    /// Orientation categories which can be observed for this signature
    ///
    pub fn allowed_categories(&self) -> &'static [OrientationCategory] {
        use OrientationCategory::*;
        use PairSignature::*;
        match self {
            Aac => &[One],
            Aab | Aba | Abb | Abc => &[Two],
            Baa | Bba | Bab | Bbb | Bac | Bbc => &[Three, Four],
            Cxx => &[One, Two, Three, Four],
        }
    }

    /// True for signatures which may carry same-strand (inverted) pair orders
    fn allows_inverted_orders(&self) -> bool {
        use PairSignature::*;
        matches!(self, Cxx | Baa | Bba | Bab | Bbb | Bac | Bbc)
    }
}

/// Sequencing library pairing protocol, determines how pair order strings map to orientation categories
///
#[derive(Clone, Copy, Debug, Default, Deserialize, Display, Eq, PartialEq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PairingType {
    /// Paired-end
    #[default]
    Pe,
    /// Long mate pair
    Lmp,
    /// Illumina mate pair
    Imp,
}

/// Breakend orientation category of a discordant pair
///
#[derive(Clone, Copy, Debug, Display, EnumCount, Eq, FromRepr, Hash, Ord, PartialEq, PartialOrd)]
#[repr(u8)]
pub enum OrientationCategory {
    #[strum(to_string = "1")]
    One = 1,
    #[strum(to_string = "2")]
    Two,
    #[strum(to_string = "3")]
    Three,
    #[strum(to_string = "4")]
    Four,
}

/// Find the orientation category of a pair from its signature and pair order string
///
/// Returns None for combinations which are not consistent with any breakend orientation
///
pub fn get_orientation_category(
    signature: PairSignature,
    pair_order: &str,
    pairing_type: PairingType,
) -> Option<OrientationCategory> {
    match pairing_type {
        PairingType::Lmp => get_lmp_category(signature, pair_order),
        PairingType::Pe => get_pe_category(signature, pair_order),
        PairingType::Imp => get_imp_category(signature, pair_order),
    }
}

fn get_lmp_category(signature: PairSignature, pair_order: &str) -> Option<OrientationCategory> {
    use OrientationCategory::*;
    use PairSignature::*;
    if matches!(signature, Cxx | Aac) && matches!(pair_order, "F2F1" | "R1R2") {
        Some(One)
    } else if matches!(signature, Cxx | Aba | Abc | Abb) && matches!(pair_order, "F1F2" | "R2R1")
    {
        Some(Two)
    } else if signature.allows_inverted_orders() {
        match pair_order {
            "F2R1" | "R1F2" => Some(Three),
            "F1R2" | "R2F1" => Some(Four),
            _ => None,
        }
    } else if signature == Aab && matches!(pair_order, "F2F1" | "R1R2") {
        Some(Two)
    } else {
        None
    }
}

fn get_pe_category(signature: PairSignature, pair_order: &str) -> Option<OrientationCategory> {
    use OrientationCategory::*;
    use PairSignature::*;
    if matches!(signature, Cxx | Aac) && matches!(pair_order, "F2R1" | "F1R2") {
        Some(One)
    } else if matches!(signature, Cxx | Aab | Aba | Abb | Abc)
        && matches!(pair_order, "R1F2" | "R2F1")
    {
        Some(Two)
    } else if signature.allows_inverted_orders() {
        match pair_order {
            "F1F2" | "F2F1" => Some(Three),
            "R2R1" | "R1R2" => Some(Four),
            _ => None,
        }
    } else {
        None
    }
}

fn get_imp_category(signature: PairSignature, pair_order: &str) -> Option<OrientationCategory> {
    use OrientationCategory::*;
    use PairSignature::*;
    if matches!(signature, Cxx | Aac) && matches!(pair_order, "R2F1" | "R1F2") {
        Some(One)
    } else if matches!(signature, Cxx | Aab | Aba | Abb | Abc)
        && matches!(pair_order, "F1R2" | "F2R1")
    {
        Some(Two)
    } else if signature.allows_inverted_orders() {
        match pair_order {
            "F1F2" | "F2F1" => Some(Four),
            "R2R1" | "R1R2" => Some(Three),
            _ => None,
        }
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_signature_tags() {
        assert_eq!(PairSignature::COUNT, 12);
        for sig in PairSignature::iter() {
            assert_eq!(PairSignature::from_tag(&sig.to_string()), Some(sig));
        }
        assert_eq!(PairSignature::from_tag("C**"), Some(PairSignature::Cxx));
        assert_eq!(PairSignature::from_tag("AAA"), None);
        assert_eq!(PairSignature::from_tag("AXB"), None);
        assert_eq!(PairSignature::from_tag("aac"), None);
    }

    #[test]
    fn test_sv_type_label() {
        assert_eq!(PairSignature::Cxx.sv_type_label(), "CTX");
        assert_eq!(PairSignature::Aac.sv_type_label(), "DEL/ITX");
        assert_eq!(PairSignature::Bbc.sv_type_label(), "INV/ITX");
        assert_eq!(PairSignature::Aab.sv_type_label(), "DUP/INS/ITX");
    }

    #[test]
    fn test_orientation_category_index() {
        assert_eq!(OrientationCategory::from_repr(3), Some(OrientationCategory::Three));
        assert_eq!(OrientationCategory::from_repr(5), None);
        assert_eq!(OrientationCategory::Four.to_string(), "4");
    }

    #[test]
    fn test_lmp_categories() {
        use OrientationCategory::*;
        use PairSignature::*;
        let lmp = PairingType::Lmp;
        assert_eq!(get_orientation_category(Aac, "F2F1", lmp), Some(One));
        assert_eq!(get_orientation_category(Aac, "R1R2", lmp), Some(One));
        assert_eq!(get_orientation_category(Aac, "F1F2", lmp), None);
        assert_eq!(get_orientation_category(Aab, "F2F1", lmp), Some(Two));
        assert_eq!(get_orientation_category(Aba, "R2R1", lmp), Some(Two));
        assert_eq!(get_orientation_category(Bab, "F2R1", lmp), Some(Three));
        assert_eq!(get_orientation_category(Bab, "R2F1", lmp), Some(Four));
        assert_eq!(get_orientation_category(Cxx, "F2F1", lmp), Some(One));
        assert_eq!(get_orientation_category(Cxx, "F1R2", lmp), Some(Four));
    }

    #[test]
    fn test_pe_and_imp_categories() {
        use OrientationCategory::*;
        use PairSignature::*;
        assert_eq!(get_orientation_category(Aac, "F1R2", PairingType::Pe), Some(One));
        assert_eq!(get_orientation_category(Aab, "R2F1", PairingType::Pe), Some(Two));
        assert_eq!(get_orientation_category(Bbb, "F1F2", PairingType::Pe), Some(Three));
        assert_eq!(get_orientation_category(Bbb, "R1R2", PairingType::Pe), Some(Four));
        assert_eq!(get_orientation_category(Aac, "F2F1", PairingType::Pe), None);

        assert_eq!(get_orientation_category(Aac, "R2F1", PairingType::Imp), Some(One));
        assert_eq!(get_orientation_category(Abc, "F2R1", PairingType::Imp), Some(Two));
        assert_eq!(get_orientation_category(Baa, "F1F2", PairingType::Imp), Some(Four));
        assert_eq!(get_orientation_category(Baa, "R2R1", PairingType::Imp), Some(Three));
    }

    #[test]
    fn test_categories_respect_allowed_set() {
        let orders = [
            "F1F2", "F2F1", "R1R2", "R2R1", "F1R2", "F2R1", "R1F2", "R2F1",
        ];
        for pairing_type in [PairingType::Pe, PairingType::Lmp, PairingType::Imp] {
            for sig in PairSignature::iter() {
                for order in orders {
                    if let Some(cat) = get_orientation_category(sig, order, pairing_type) {
                        assert!(sig.allowed_categories().contains(&cat));
                    }
                }
            }
        }
    }
}
