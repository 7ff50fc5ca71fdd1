use std::collections::BTreeSet;

use crate::bureau::domain::{normalize_entity_name, PeriodSnapshot};

/// Entity-name patterns per coefficient bucket. Matching runs over the
/// folded entity name, so casing, accents, and extra whitespace in the feed
/// never change bucket assignment.
const BUCKET_PATTERNS: &[(&str, &[&str])] = &[
    ("santa", &["santander"]),
    ("oca", &["oca"]),
    ("brou", &["brou", "banco republica"]),
    ("itau", &["itau"]),
    ("scotia", &["scotia"]),
    ("bbva", &["bbva"]),
    ("hsbc", &["hsbc"]),
    ("creditel", &["creditel", "socur"]),
    ("pronto", &["pronto", "baluma"]),
    ("credito_directo", &["creditos directos"]),
    ("fucac", &["fucac"]),
    ("anda", &["anda"]),
];

/// Buckets that count toward the `banco_binned` bank-presence indicator.
const BANK_BUCKETS: &[&str] = &["santa", "brou", "itau", "scotia", "bbva", "hsbc"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Period {
    T0,
    T6,
}

/// Parsed form of a coefficient key from the rules table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CoefficientKey<'a> {
    Intercept,
    BancoBinned,
    Bucket { period: Period, bucket: &'a str },
    Unknown,
}

pub(crate) fn parse_coefficient_key(key: &str) -> CoefficientKey<'_> {
    if key == "intercept" {
        return CoefficientKey::Intercept;
    }
    if key == "banco_binned" {
        return CoefficientKey::BancoBinned;
    }
    let (period, rest) = if let Some(rest) = key.strip_prefix("t0_") {
        (Period::T0, rest)
    } else if let Some(rest) = key.strip_prefix("t6_") {
        (Period::T6, rest)
    } else {
        return CoefficientKey::Unknown;
    };
    match rest.strip_suffix("_binned") {
        Some(bucket) if !bucket.is_empty() => CoefficientKey::Bucket { period, bucket },
        _ => CoefficientKey::Unknown,
    }
}

fn bucket_for(folded_name: &str) -> Option<&'static str> {
    BUCKET_PATTERNS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| folded_name.contains(p)))
        .map(|(bucket, _)| *bucket)
}

/// 1.0 when any entity assigned to the bucket carries non-zero vigente in
/// the period, else 0.0.
pub(crate) fn bucket_indicator(snapshot: &PeriodSnapshot, bucket: &str) -> f64 {
    let fired = snapshot.entities.iter().any(|entity| {
        entity.vigente > 0.0
            && bucket_for(&normalize_entity_name(&entity.nombre_entidad)) == Some(bucket)
    });
    if fired {
        1.0
    } else {
        0.0
    }
}

/// Distinct bank-bucket entities present in the snapshot.
pub(crate) fn bank_entity_count(snapshot: &PeriodSnapshot) -> usize {
    snapshot
        .entities
        .iter()
        .filter_map(|entity| {
            let folded = normalize_entity_name(&entity.nombre_entidad);
            bucket_for(&folded)
                .filter(|bucket| BANK_BUCKETS.contains(bucket))
                .map(|_| folded)
        })
        .collect::<BTreeSet<_>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bureau::domain::{EntityExposure, RubroLine};

    fn entity(name: &str, vigente: f64) -> EntityExposure {
        EntityExposure::from_rubros(
            name.to_string(),
            Some("1A".to_string()),
            vec![RubroLine {
                rubro: "CRÉDITOS VIGENTES".to_string(),
                mn_pesos: vigente,
                me_pesos: 0.0,
                mn_dolares: 0.0,
                me_dolares: 0.0,
            }],
        )
    }

    #[test]
    fn keys_parse_into_their_bucket_forms() {
        assert_eq!(parse_coefficient_key("intercept"), CoefficientKey::Intercept);
        assert_eq!(parse_coefficient_key("banco_binned"), CoefficientKey::BancoBinned);
        assert_eq!(
            parse_coefficient_key("t0_santa_binned"),
            CoefficientKey::Bucket {
                period: Period::T0,
                bucket: "santa"
            }
        );
        assert_eq!(
            parse_coefficient_key("t6_oca_binned"),
            CoefficientKey::Bucket {
                period: Period::T6,
                bucket: "oca"
            }
        );
        assert_eq!(parse_coefficient_key("t0__binned"), CoefficientKey::Unknown);
        assert_eq!(parse_coefficient_key("mystery"), CoefficientKey::Unknown);
    }

    #[test]
    fn accented_feed_names_still_match_their_bucket() {
        let snapshot = PeriodSnapshot::from_entities(vec![
            entity("BANCO SANTANDER  S.A.", 1_000.0),
            entity("Banco Itaú", 500.0),
        ]);
        assert_eq!(bucket_indicator(&snapshot, "santa"), 1.0);
        assert_eq!(bucket_indicator(&snapshot, "itau"), 1.0);
        assert_eq!(bucket_indicator(&snapshot, "oca"), 0.0);
    }

    #[test]
    fn zero_vigente_does_not_fire_the_indicator() {
        let snapshot = PeriodSnapshot::from_entities(vec![entity("Banco Santander", 0.0)]);
        assert_eq!(bucket_indicator(&snapshot, "santa"), 0.0);
    }

    #[test]
    fn bank_count_ignores_non_bank_buckets_and_duplicates() {
        let snapshot = PeriodSnapshot::from_entities(vec![
            entity("Banco Santander", 1_000.0),
            entity("BANCO  SANTANDER", 2_000.0),
            entity("Banco Itaú", 500.0),
            entity("OCA", 300.0),
            entity("Creditel", 200.0),
        ]);
        assert_eq!(bank_entity_count(&snapshot), 2);
    }
}
