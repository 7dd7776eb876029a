//! Maps upstream signal labels onto [`SignalLevel`].
//!
//! Both classifiers emit the Korean five-way labels (`적극매수` .. `적극매도`);
//! English snake_case and spaced variants are accepted as well so that fixtures
//! and hand-written archives load the same way.

use crate::{NormalizationError, SignalLevel, SourceId};

pub fn normalize(raw: &str, source: SourceId) -> Result<SignalLevel, NormalizationError> {
    let trimmed = raw.trim();

    let level = match trimmed {
        "적극매수" => Some(SignalLevel::StrongBuy),
        "매수" => Some(SignalLevel::Buy),
        "중립" => Some(SignalLevel::Neutral),
        "매도" => Some(SignalLevel::Sell),
        "적극매도" => Some(SignalLevel::StrongSell),
        _ => parse_ascii(trimmed),
    };

    level.ok_or_else(|| NormalizationError {
        source_id: source,
        raw: raw.to_string(),
    })
}

fn parse_ascii(label: &str) -> Option<SignalLevel> {
    let lower = label.to_lowercase();
    match lower.as_str() {
        "buy" => Some(SignalLevel::Buy),
        "neutral" | "hold" => Some(SignalLevel::Neutral),
        "sell" => Some(SignalLevel::Sell),
        _ => {
            // "Strong Buy", "strong-buy", "STRONG_BUY" and "StrongBuy": at most one separator
            let rest = lower.strip_prefix("strong")?;
            let rest = rest.strip_prefix([' ', '_', '-']).unwrap_or(rest);
            match rest {
                "buy" => Some(SignalLevel::StrongBuy),
                "sell" => Some(SignalLevel::StrongSell),
                _ => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_korean_labels() {
        for level in SignalLevel::ALL {
            assert_eq!(normalize(level.label(), SourceId::Vision), Ok(level));
        }
    }

    #[test]
    fn test_english_variants() {
        assert_eq!(normalize("strong_buy", SourceId::Api), Ok(SignalLevel::StrongBuy));
        assert_eq!(normalize("Strong Sell", SourceId::Api), Ok(SignalLevel::StrongSell));
        assert_eq!(normalize("  BUY ", SourceId::Api), Ok(SignalLevel::Buy));
        assert_eq!(normalize("hold", SourceId::Api), Ok(SignalLevel::Neutral));
    }

    #[test]
    fn test_unknown_label_is_error() {
        let err = normalize("관망", SourceId::Vision).unwrap_err();
        assert_eq!(err.source_id, SourceId::Vision);
        assert_eq!(err.raw, "관망");

        assert!(normalize("", SourceId::Api).is_err());
        assert!(normalize("very strong buy", SourceId::Api).is_err());
    }

    #[test]
    fn test_separators_only_between_words() {
        assert_eq!(normalize("StrongBuy", SourceId::Api), Ok(SignalLevel::StrongBuy));
        assert_eq!(normalize("strong-sell", SourceId::Api), Ok(SignalLevel::StrongSell));
        assert_eq!(normalize("STRONG_BUY", SourceId::Api), Ok(SignalLevel::StrongBuy));

        for label in ["b-u-y", "s e l l", "neu_tral", "strong__buy", "strong", "buy-", "_sell"] {
            assert!(normalize(label, SourceId::Api).is_err(), "{label} should be rejected");
        }
    }
}
