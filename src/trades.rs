// 🗂️ Trade-to-Specialty Mapping - Scraped trade taxonomy → directory vocabulary
// Static table, many-to-many: one trade may map to several specialty strings

use crate::normalize::normalize;

/// Scraped trade → acceptable specialty strings in the directory store.
/// Keys are matched on their normalized form, so "Électricien" and
/// "electricien" hit the same row.
const TRADE_SPECIALTIES: &[(&str, &[&str])] = &[
    ("plombier", &["Plombier", "Plombier chauffagiste", "Plomberie"]),
    ("chauffagiste", &["Chauffagiste", "Plombier chauffagiste"]),
    ("electricien", &["Électricien", "Électricité générale"]),
    ("macon", &["Maçon", "Maçonnerie générale"]),
    ("couvreur", &["Couvreur", "Couvreur zingueur", "Couverture"]),
    ("charpentier", &["Charpentier", "Charpente"]),
    ("menuisier", &["Menuisier", "Menuiserie"]),
    ("peintre", &["Peintre en bâtiment", "Peinture"]),
    ("platrier", &["Plâtrier", "Plâtrerie"]),
    ("carreleur", &["Carreleur", "Carrelage"]),
    ("serrurier", &["Serrurier", "Serrurerie métallerie"]),
    ("paysagiste", &["Paysagiste", "Jardinier paysagiste"]),
    ("jardinier", &["Jardinier", "Jardinier paysagiste"]),
    ("terrassier", &["Terrassement"]),
];

/// Specialty strings acceptable for a scraped trade.
///
/// Unknown trades fall back to the trade string itself (capitalized), so a
/// taxonomy gap degrades to an exact-vocabulary filter instead of an empty
/// candidate set.
pub fn specialties_for(trade: &str) -> Vec<String> {
    let key = normalize(trade);

    for (known, specialties) in TRADE_SPECIALTIES {
        if *known == key {
            return specialties.iter().map(|s| s.to_string()).collect();
        }
    }

    let mut chars = trade.trim().chars();
    match chars.next() {
        Some(first) => vec![first.to_uppercase().chain(chars).collect()],
        None => Vec::new(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_trade() {
        let specialties = specialties_for("plombier");
        assert!(specialties.contains(&"Plombier".to_string()));
        assert!(specialties.contains(&"Plombier chauffagiste".to_string()));
    }

    #[test]
    fn test_accented_trade_key() {
        // Scrapers are inconsistent about accents in the trade field
        assert_eq!(specialties_for("électricien"), specialties_for("electricien"));
        assert_eq!(specialties_for("maçon"), specialties_for("macon"));
    }

    #[test]
    fn test_many_to_many() {
        // Two trades may share a specialty string
        let plombier = specialties_for("plombier");
        let chauffagiste = specialties_for("chauffagiste");
        assert!(plombier.contains(&"Plombier chauffagiste".to_string()));
        assert!(chauffagiste.contains(&"Plombier chauffagiste".to_string()));
    }

    #[test]
    fn test_unknown_trade_falls_back_to_itself() {
        assert_eq!(specialties_for("ramoneur"), vec!["Ramoneur".to_string()]);
        assert!(specialties_for("").is_empty());
    }
}
