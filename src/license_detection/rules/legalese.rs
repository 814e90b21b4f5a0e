//! Legalese: words that are strong evidence of license text.
//!
//! Legalese words receive the lowest token ids so that a token id below
//! `len_legalese` marks a "high" token. Spelling variants of one word share
//! an id.

/// Groups of equivalent legalese words. Each group gets one token id, in order.
const LEGALESE_GROUPS: &[&[&str]] = &[
    &["license", "licence", "licenses", "licences", "licensed", "licenced"],
    &["licensor", "licensors", "licencor"],
    &["licensee", "licensees", "licencee"],
    &["licensing", "licencing"],
    &["copyright", "copyrights", "copyrighted", "copyrightable"],
    &["copyleft"],
    &["redistribute", "redistributed", "redistributing", "redistributes"],
    &["redistribution", "redistributions"],
    &["distribute", "distributed", "distributing", "distributes"],
    &["distribution", "distributions", "distributor", "distributors"],
    &["permit", "permits", "permitted", "permitting"],
    &["permission", "permissions"],
    &["derivative", "derivatives", "derived"],
    &["sublicense", "sublicenses", "sublicensing", "sublicence"],
    &["commercial", "commercially"],
    &["noncommercial"],
    &["agreement", "agreements"],
    &["warranty", "warranties", "warranted", "warrant"],
    &["merchantability", "merchantable"],
    &["fitness"],
    &["infringement", "infringe", "infringing", "noninfringement"],
    &["disclaimer", "disclaimers", "disclaim", "disclaimed", "disclaims"],
    &["liability", "liabilities", "liable"],
    &["damages", "damage"],
    &["contributor", "contributors"],
    &["contribution", "contributions"],
    &["modification", "modifications"],
    &["modify", "modified", "modifying"],
    &["restriction", "restrictions", "restricted"],
    &["limitation", "limitations", "limited"],
    &["intellectual"],
    &["patent", "patents", "patented"],
    &["trademark", "trademarks"],
    &["notice", "notices"],
    &["condition", "conditions"],
    &["obligation", "obligations", "obligate"],
    &["enforceable", "unenforceable", "enforce"],
    &["statutory"],
    &["consequential"],
    &["incidental"],
    &["exemplary"],
    &["indemnify", "indemnification", "indemnity"],
    &["pursuant"],
    &["hereby"],
    &["herein", "hereof", "hereto", "hereunder", "hereinafter"],
    &["thereof", "therein", "thereto"],
    &["whereas"],
    &["notwithstanding"],
    &["aforementioned", "foregoing"],
    &["terminate", "terminated", "termination", "terminates"],
    &["grant", "grants", "granted", "granting"],
    &["royalty", "royalties"],
    &["perpetual", "irrevocable"],
    &["worldwide"],
    &["nonexclusive", "exclusive"],
    &["acknowledge", "acknowledgement", "acknowledgment", "acknowledged"],
    &["express", "expressly"],
    &["implied", "implies"],
    &["merchant"],
    &["contract", "contractual"],
    &["tort", "negligence"],
    &["jurisdiction", "jurisdictions"],
    &["governed", "governing"],
    &["provisions", "provision"],
    &["gpl", "gplv2", "gplv3", "gpl2", "gpl3"],
    &["lgpl", "lgplv2", "lgplv3", "lgpl2", "lgpl3"],
    &["agpl", "agplv3"],
    &["gnu"],
    &["bsd"],
    &["mit"],
    &["apache"],
    &["mozilla", "mpl"],
    &["eclipse", "epl"],
    &["spdx"],
    &["proprietary"],
    &["confidential"],
    &["unlicense", "unlicensed"],
    &["publicdomain"],
    &["freeware", "shareware"],
    &["endorse", "endorsement", "endorsements"],
    &["promote", "promotion"],
    &["prior", "written"],
    &["binary", "binaries"],
    &["source", "sources"],
    &["retain", "retains", "retained"],
    &["reproduce", "reproduced", "reproduction"],
    &["disclosure", "disclose"],
    &["conveying", "convey", "conveyed"],
    &["covered"],
    &["accompanying"],
    &["attribution", "attributions"],
    &["incorporate", "incorporated", "incorporating"],
    &["compliance", "comply", "complies"],
    &["lawful", "unlawful", "law", "laws"],
    &["exception", "exceptions"],
    &["remedy", "remedies"],
    &["severability", "severable"],
    &["assign", "assignment", "assigns"],
    &["heirs", "successors"],
];

/// Legalese words with their token id, in id order.
pub fn legalese_words() -> Vec<(&'static str, u16)> {
    LEGALESE_GROUPS
        .iter()
        .enumerate()
        .flat_map(|(id, words)| words.iter().map(move |word| (*word, id as u16)))
        .collect()
}

/// Number of distinct legalese ids.
pub fn legalese_count() -> usize {
    LEGALESE_GROUPS.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_variants_share_an_id() {
        let words: HashMap<_, _> = legalese_words().into_iter().collect();
        assert_eq!(words["license"], words["licence"]);
        assert_eq!(words["warranty"], words["warranties"]);
        assert_ne!(words["license"], words["copyright"]);
    }

    #[test]
    fn test_ids_are_below_count() {
        let count = legalese_count();
        assert!(legalese_words().iter().all(|(_, id)| (*id as usize) < count));
    }

    #[test]
    fn test_words_are_unique() {
        let words = legalese_words();
        let distinct: std::collections::HashSet<_> = words.iter().map(|(w, _)| *w).collect();
        assert_eq!(distinct.len(), words.len());
    }
}
