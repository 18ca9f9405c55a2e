//! Card numbers and QR payloads.
//!
//! - card number: `YY` + 6-digit per-year sequence + `RC`|`TC` + 16 hex chars
//! - QR payload: `YYYY` + `RC`|`TC` + 5-digit sequence + 32 hex chars
//!
//! Sequences are counters in the administrative database, so they survive
//! restarts and are shared by every tenant.

use std::sync::Arc;

use anyhow::Result;
use chrono::{Datelike, Utc};
use qsl_store::{random_hex, registry_error, ConnectionRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardKind {
    Received,
    Sent,
}

impl CardKind {
    /// `sent` maps to [`CardKind::Sent`]; anything else is a received card.
    pub fn from_card_type(card_type: Option<&str>) -> Self {
        match card_type {
            Some("sent") => CardKind::Sent,
            _ => CardKind::Received,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            CardKind::Received => "RC",
            CardKind::Sent => "TC",
        }
    }

    fn counter_field(&self) -> &'static str {
        match self {
            CardKind::Received => "receivedCount",
            CardKind::Sent => "sentCount",
        }
    }
}

pub fn format_card_number(year: i32, seq: i64, kind: CardKind) -> String {
    format!(
        "{:02}{:06}{}{}",
        year.rem_euclid(100),
        seq,
        kind.code(),
        random_hex(16)
    )
}

pub fn format_qr_payload(year: i32, seq: i64, kind: CardKind) -> String {
    format!("{:04}{}{:05}{}", year, kind.code(), seq, random_hex(32))
}

#[derive(Clone)]
pub struct Numbering {
    registry: Arc<ConnectionRegistry>,
}

impl Numbering {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    async fn next(&self, counter: &str, field: &str) -> Result<i64> {
        let admin = self.registry.administrative().map_err(registry_error)?;
        admin.counters().increment(counter, field, 1).await
    }

    pub async fn next_card_number(&self, kind: CardKind) -> Result<String> {
        let year = Utc::now().year();
        let seq = self
            .next(&format!("cards-{year}"), kind.counter_field())
            .await?;
        Ok(format_card_number(year, seq, kind))
    }

    /// QR payloads are counted per tenant.
    pub async fn next_qr_payload(&self, tenant: &str, kind: CardKind) -> Result<String> {
        let year = Utc::now().year();
        let seq = self
            .next(&format!("qr:{tenant}:{year}"), kind.counter_field())
            .await?;
        Ok(format_qr_payload(year, seq, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_numbers_have_the_documented_layout() {
        let n = format_card_number(2024, 42, CardKind::Received);
        assert_eq!(n.len(), 2 + 6 + 2 + 16);
        assert!(n.starts_with("24000042RC"));
        assert!(n[10..].bytes().all(|b| b.is_ascii_hexdigit()));

        let s = format_card_number(2031, 7, CardKind::Sent);
        assert!(s.starts_with("31000007TC"));
    }

    #[test]
    fn qr_payloads_have_the_documented_layout() {
        let q = format_qr_payload(2024, 3, CardKind::Sent);
        assert_eq!(q.len(), 4 + 2 + 5 + 32);
        assert!(q.starts_with("2024TC00003"));
    }

    #[tokio::test]
    async fn sequences_are_separate_per_kind() {
        let registry = Arc::new(
            ConnectionRegistry::from_uri("memory://localhost/numbering-tests").unwrap(),
        );
        registry.init_administrative().await.unwrap();
        let numbering = Numbering::new(registry);

        let a = numbering.next_card_number(CardKind::Received).await.unwrap();
        let b = numbering.next_card_number(CardKind::Received).await.unwrap();
        let c = numbering.next_card_number(CardKind::Sent).await.unwrap();

        assert_eq!(&a[2..8], "000001");
        assert_eq!(&b[2..8], "000002");
        assert_eq!(&c[2..8], "000001");
        assert_ne!(a, b);

        let q1 = numbering.next_qr_payload("t1", CardKind::Received).await.unwrap();
        let q2 = numbering.next_qr_payload("t2", CardKind::Received).await.unwrap();
        assert_eq!(&q1[6..11], "00001");
        assert_eq!(&q2[6..11], "00001");
    }
}
