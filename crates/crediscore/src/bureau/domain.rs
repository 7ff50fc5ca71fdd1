use std::fmt;

use serde::{Deserialize, Serialize};

/// Bureau feeds understood by the engine, selected by a runtime tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Equifax,
    Bcu,
    Mym,
}

impl Provider {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "equifax" => Some(Self::Equifax),
            "bcu" => Some(Self::Bcu),
            "mym" => Some(Self::Mym),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Equifax => "equifax",
            Self::Bcu => "bcu",
            Self::Mym => "mym",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Credit-rating codes ordered best to worst.
pub const RATING_ORDER: [&str; 10] = ["1A", "1B", "1C", "2A", "2B", "2C", "3", "4", "5", "6"];

/// Position of a rating within [`RATING_ORDER`]; unknown codes have no rank.
pub fn rating_rank(code: &str) -> Option<usize> {
    let trimmed = code.trim();
    RATING_ORDER
        .iter()
        .position(|candidate| candidate.eq_ignore_ascii_case(trimmed))
}

/// Worst rating across the given codes. Codes outside [`RATING_ORDER`] are
/// excluded from the ordering rather than defaulting to best or worst.
pub fn worst_rating<'a, I>(codes: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    codes
        .into_iter()
        .filter_map(|code| rating_rank(code).map(|rank| (rank, code)))
        .max_by_key(|(rank, _)| *rank)
        .map(|(_, code)| code.trim().to_ascii_uppercase())
}

/// Canonical-form institution name used for bucket lookups: whitespace
/// collapsed, ascii-lowercased, common Spanish diacritics folded.
pub fn normalize_entity_name(value: &str) -> String {
    let folded: String = value
        .chars()
        .map(|c| match c {
            'á' | 'Á' | 'à' | 'À' | 'ä' | 'Ä' => 'a',
            'é' | 'É' | 'è' | 'È' | 'ë' | 'Ë' => 'e',
            'í' | 'Í' | 'ì' | 'Ì' | 'ï' | 'Ï' => 'i',
            'ó' | 'Ó' | 'ò' | 'Ò' | 'ö' | 'Ö' => 'o',
            'ú' | 'Ú' | 'ù' | 'Ù' | 'ü' | 'Ü' => 'u',
            'ñ' | 'Ñ' => 'n',
            '\u{feff}' | '\u{200b}' => ' ',
            other => other,
        })
        .collect();
    let collapsed = folded.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_ascii_lowercase()
}

/// Amounts split by currency: local-currency pesos and foreign-currency pesos.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub mn: f64,
    pub me: f64,
}

impl Money {
    pub fn total(&self) -> f64 {
        self.mn + self.me
    }

    fn accumulate(&mut self, mn: f64, me: f64) {
        self.mn += mn;
        self.me += me;
    }
}

/// Raw reported line item, preserved for aggregate recomputation and audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubroLine {
    pub rubro: String,
    pub mn_pesos: f64,
    pub me_pesos: f64,
    pub mn_dolares: f64,
    pub me_dolares: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RubroKind {
    Vigente,
    Vencido,
    Castigado,
}

/// Classify a reported rubro label. Labels vary in casing and diacritics
/// between providers, so the match runs on the folded form.
pub(crate) fn classify_rubro(rubro: &str) -> Option<RubroKind> {
    let folded = normalize_entity_name(rubro);
    if folded.contains("castigad") {
        Some(RubroKind::Castigado)
    } else if folded.contains("vencid") {
        Some(RubroKind::Vencido)
    } else if folded.contains("vigente") {
        Some(RubroKind::Vigente)
    } else {
        None
    }
}

/// One reporting institution's exposure within a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityExposure {
    pub nombre_entidad: String,
    pub rating: Option<String>,
    pub vigente: f64,
    pub vencido: f64,
    pub castigado: f64,
    pub rubros: Vec<RubroLine>,
}

impl EntityExposure {
    /// Build an exposure from raw rubros, deriving the per-kind balances in
    /// pesos (mn + me) from the matching line items.
    pub fn from_rubros(
        nombre_entidad: String,
        rating: Option<String>,
        rubros: Vec<RubroLine>,
    ) -> Self {
        let mut vigente = 0.0;
        let mut vencido = 0.0;
        let mut castigado = 0.0;
        for line in &rubros {
            let amount = line.mn_pesos + line.me_pesos;
            match classify_rubro(&line.rubro) {
                Some(RubroKind::Vigente) => vigente += amount,
                Some(RubroKind::Vencido) => vencido += amount,
                Some(RubroKind::Castigado) => castigado += amount,
                None => {}
            }
        }
        Self {
            nombre_entidad,
            rating: rating.map(|r| r.trim().to_ascii_uppercase()),
            vigente,
            vencido,
            castigado,
            rubros,
        }
    }
}

/// Per-rubro sums across every entity of a period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RubroAggregates {
    pub vigente: Money,
    pub vencido: Money,
    pub castigado: Money,
}

/// Recompute the aggregates from the raw line items.
pub fn aggregate_rubros(entities: &[EntityExposure]) -> RubroAggregates {
    let mut aggregates = RubroAggregates::default();
    for entity in entities {
        for line in &entity.rubros {
            let slot = match classify_rubro(&line.rubro) {
                Some(RubroKind::Vigente) => &mut aggregates.vigente,
                Some(RubroKind::Vencido) => &mut aggregates.vencido,
                Some(RubroKind::Castigado) => &mut aggregates.castigado,
                None => continue,
            };
            slot.accumulate(line.mn_pesos, line.me_pesos);
        }
    }
    aggregates
}

/// Entities and aggregates for one reporting period. A period missing at the
/// source normalizes to the empty snapshot, never to a null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodSnapshot {
    pub entities: Vec<EntityExposure>,
    pub aggregates: RubroAggregates,
}

impl PeriodSnapshot {
    pub fn from_entities(entities: Vec<EntityExposure>) -> Self {
        let aggregates = aggregate_rubros(&entities);
        Self {
            entities,
            aggregates,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Current period (`t0`) and the period six months prior (`t6`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodData {
    pub t0: PeriodSnapshot,
    pub t6: PeriodSnapshot,
}

/// Flags precomputed at normalization so the rejection gate never re-parses
/// provider-specific fields. Rating-based rejection is policy-dependent and
/// is therefore evaluated at score time from `metadata.worst_rating`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditFlags {
    pub is_deceased: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditMetadata {
    pub nombre: Option<String>,
    pub worst_rating: Option<String>,
    pub periodo_t0: Option<String>,
    pub periodo_t6: Option<String>,
    pub provider: Provider,
}

/// The canonical document every provider response converges to. Produced once
/// per fetch and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedCreditData {
    pub provider: Provider,
    pub documento: String,
    pub flags: CreditFlags,
    pub metadata: CreditMetadata,
    pub periods: PeriodData,
}
